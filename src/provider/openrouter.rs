//! OpenRouter API client implementation for chat-completion requests.
//!
//! OpenRouter fronts many upstream model providers behind one
//! OpenAI-compatible endpoint, which is what lets a single client drive
//! every candidate model in a batch.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::chat::{ChatMessage, Usage};
use crate::error::BenchError;

use super::{CallParams, ChatCompletion, ChatProvider};

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Configuration for the OpenRouter client.
#[derive(Debug)]
pub struct OpenRouterConfig {
    /// API key for authentication with OpenRouter.
    pub api_key: String,
    /// Base URL of the chat-completion API.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_seconds: Option<u64>,
}

/// Client for interacting with OpenRouter's API.
///
/// The client uses `Arc` internally for configuration, making cloning cheap.
#[derive(Debug, Clone)]
pub struct OpenRouter {
    /// Shared configuration wrapped in Arc for cheap cloning.
    pub config: Arc<OpenRouterConfig>,
    /// HTTP client for making requests.
    pub client: Client,
}

#[derive(Serialize)]
struct OpenRouterChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenRouterChatRequest<'a> {
    model: &'a str,
    messages: Vec<OpenRouterChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize, Debug)]
struct OpenRouterChatResponse {
    choices: Vec<OpenRouterChatChoice>,
    usage: Option<Usage>,
}

#[derive(Deserialize, Debug)]
struct OpenRouterChatChoice {
    message: OpenRouterChatMsg,
}

#[derive(Deserialize, Debug)]
struct OpenRouterChatMsg {
    content: Option<String>,
}

impl OpenRouter {
    pub fn new(
        api_key: impl Into<String>,
        base_url: Option<String>,
        timeout_seconds: Option<u64>,
    ) -> Self {
        let mut builder = Client::builder();
        if let Some(sec) = timeout_seconds {
            builder = builder.timeout(std::time::Duration::from_secs(sec));
        }
        Self::with_client(
            builder.build().expect("Failed to build reqwest Client"),
            api_key,
            base_url,
            timeout_seconds,
        )
    }

    /// Creates a new OpenRouter client with a custom HTTP client.
    pub fn with_client(
        client: Client,
        api_key: impl Into<String>,
        base_url: Option<String>,
        timeout_seconds: Option<u64>,
    ) -> Self {
        Self {
            config: Arc::new(OpenRouterConfig {
                api_key: api_key.into(),
                base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                timeout_seconds,
            }),
            client,
        }
    }

    pub fn api_key(&self) -> &str {
        &self.config.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn timeout_seconds(&self) -> Option<u64> {
        self.config.timeout_seconds
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ChatProvider for OpenRouter {
    /// Sends one chat-completion request to OpenRouter's API.
    ///
    /// # Arguments
    ///
    /// * `model` - The OpenRouter model id to generate with
    /// * `messages` - The messages to send, in order
    /// * `params` - Token budget and temperature for this call
    ///
    /// # Returns
    ///
    /// The generated text and token usage, or an error
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &CallParams,
    ) -> Result<ChatCompletion, BenchError> {
        if self.config.api_key.is_empty() {
            return Err(BenchError::Auth("Missing OpenRouter API key".to_string()));
        }

        let wire_msgs: Vec<OpenRouterChatMessage> = messages
            .iter()
            .map(|m| OpenRouterChatMessage {
                role: m.role.as_str(),
                content: &m.content,
            })
            .collect();

        let body = OpenRouterChatRequest {
            model,
            messages: wire_msgs,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stream: false,
        };

        if log::log_enabled!(log::Level::Trace) {
            if let Ok(json) = serde_json::to_string(&body) {
                log::trace!("OpenRouter request payload: {}", json);
            }
        }

        let mut request = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&body);

        if let Some(timeout) = self.config.timeout_seconds {
            request = request.timeout(std::time::Duration::from_secs(timeout));
        }

        let resp = request.send().await?;

        log::debug!("OpenRouter HTTP status: {}", resp.status());

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await?;
            return Err(BenchError::Provider(format!(
                "OpenRouter returned error status {status}: {error_text}"
            )));
        }

        let resp_text = resp.text().await?;
        let json_resp: OpenRouterChatResponse =
            serde_json::from_str(&resp_text).map_err(|e| BenchError::ResponseFormat {
                message: format!("Failed to decode OpenRouter response: {e}"),
                raw_response: resp_text.clone(),
            })?;

        let text = json_resp
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| BenchError::ResponseFormat {
                message: "invalid response structure".to_string(),
                raw_response: resp_text,
            })?;

        Ok(ChatCompletion {
            text,
            usage: json_resp.usage.unwrap_or_default(),
        })
    }
}
