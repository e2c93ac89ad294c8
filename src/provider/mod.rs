//! The provider seam: one trait for issuing a chat-completion request,
//! plus the concrete OpenRouter client.

mod openrouter;

pub use openrouter::{OpenRouter, OpenRouterConfig};

use async_trait::async_trait;

use crate::chat::{ChatMessage, Usage};
use crate::error::BenchError;

/// Per-call generation parameters.
#[derive(Debug, Clone, Copy)]
pub struct CallParams {
    /// Maximum tokens to generate in the response
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

/// A completed chat-completion response.
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    /// The generated text
    pub text: String,
    /// Token usage reported by the provider
    pub usage: Usage,
}

/// Trait for anything that can answer one chat-completion request.
///
/// A single failed attempt is terminal for its (model, prompt) pair; the
/// caller decides what a failure means, this trait never retries.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &CallParams,
    ) -> Result<ChatCompletion, BenchError>;
}
