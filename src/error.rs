use thiserror::Error;

/// Error types that can occur while running a benchmark batch.
#[derive(Debug, Error)]
pub enum BenchError {
    /// HTTP request/response errors
    #[error("HTTP error: {0}")]
    Http(String),
    /// Authentication and authorization errors
    #[error("Auth error: {0}")]
    Auth(String),
    /// Invalid batch input, rejected before any network call
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// None of the requested model ids exist in the registry
    #[error("{0}")]
    ModelsNotFound(String),
    /// Errors returned by an upstream model provider
    #[error("Provider error: {0}")]
    Provider(String),
    /// API response parsing or format error
    #[error("Response format error: {message}. Raw response: {raw_response}")]
    ResponseFormat {
        message: String,
        raw_response: String,
    },
    /// Model registry lookup failures
    #[error("Registry error: {0}")]
    Registry(String),
    /// Result persistence failures
    #[error("Storage error: {0}")]
    Storage(String),
    /// JSON serialization/deserialization errors
    #[error("JSON parse error: {0}")]
    Json(String),
}

/// Converts reqwest HTTP errors into BenchErrors
impl From<reqwest::Error> for BenchError {
    fn from(err: reqwest::Error) -> Self {
        BenchError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for BenchError {
    fn from(err: serde_json::Error) -> Self {
        BenchError::Json(format!(
            "{} at line {} column {}",
            err,
            err.line(),
            err.column()
        ))
    }
}
