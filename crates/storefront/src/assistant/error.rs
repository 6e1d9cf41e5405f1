//! Error types for the shopping assistant client.

use thiserror::Error;

/// Errors from the chat-completions gateway.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({error_type}): {message}")]
    Api { error_type: String, message: String },

    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("stream error: {0}")]
    Stream(String),

    /// The conversation sent by the client was rejected before any call.
    #[error("invalid conversation: {0}")]
    InvalidHistory(String),
}

/// Error body returned by OpenAI-compatible gateways.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiError,
}

#[derive(Debug, serde::Deserialize)]
pub struct ApiError {
    pub message: String,
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
}
