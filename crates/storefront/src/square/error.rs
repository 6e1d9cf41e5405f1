//! Error types for the Square API client.

use thiserror::Error;

/// Errors that can occur when interacting with the Square API.
#[derive(Debug, Error)]
pub enum SquareError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request did not complete within the client timeout.
    #[error("request to Square timed out")]
    Timeout,

    /// Square returned an error object.
    #[error("API error ({category}/{code}): {detail}")]
    Api {
        category: String,
        code: String,
        detail: String,
    },

    /// Access token rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limited by Square.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Failed to parse response.
    #[error("parse error: {0}")]
    Parse(String),
}

impl SquareError {
    /// Whether a second attempt might succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Api { category, .. } => category == "API_ERROR",
            _ => false,
        }
    }
}

/// Error envelope returned by every Square endpoint.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub errors: Vec<ApiError>,
}

/// A single Square error.
#[derive(Debug, serde::Deserialize)]
pub struct ApiError {
    pub category: String,
    pub code: String,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
}

impl From<ApiError> for SquareError {
    fn from(err: ApiError) -> Self {
        let detail = match (err.detail, err.field) {
            (Some(detail), Some(field)) => format!("{detail} (field: {field})"),
            (Some(detail), None) => detail,
            (None, Some(field)) => format!("invalid field {field}"),
            (None, None) => "no detail provided".to_string(),
        };
        Self::Api {
            category: err.category,
            code: err.code,
            detail,
        }
    }
}
