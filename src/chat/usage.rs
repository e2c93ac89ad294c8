use serde::{Deserialize, Serialize};

/// Token usage metadata for a chat response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Number of tokens in the prompt
    #[serde(default, alias = "input_tokens")]
    pub prompt_tokens: u32,
    /// Number of tokens in the completion
    #[serde(default, alias = "output_tokens")]
    pub completion_tokens: u32,
    /// Total number of tokens used
    #[serde(default)]
    pub total_tokens: u32,
}
