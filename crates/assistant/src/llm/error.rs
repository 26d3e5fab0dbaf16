//! Error types for the LLM backends.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when calling a chat model.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider returned an error.
    #[error("API error ({error_type}): {message}")]
    Api {
        /// Error type from the API.
        error_type: String,
        /// Error message.
        message: String,
    },

    /// Rate limited by the API.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Authentication failed.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Failed to parse response.
    #[error("parse error: {0}")]
    Parse(String),

    /// The response contained no usable candidate.
    #[error("empty response: {0}")]
    EmptyResponse(String),

    /// The call exceeded its deadline.
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
}

/// Anthropic error envelope.
#[derive(Debug, serde::Deserialize)]
pub struct ClaudeErrorResponse {
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Nested error details.
    pub error: ClaudeErrorDetail,
}

/// Nested Anthropic error details.
#[derive(Debug, serde::Deserialize)]
pub struct ClaudeErrorDetail {
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message.
    pub message: String,
}

/// Google API error envelope.
#[derive(Debug, serde::Deserialize)]
pub struct GeminiErrorResponse {
    /// Error details.
    pub error: GeminiErrorDetail,
}

/// Google API error details.
#[derive(Debug, serde::Deserialize)]
pub struct GeminiErrorDetail {
    /// HTTP-like status code.
    #[serde(default)]
    pub code: u16,
    /// Error message.
    pub message: String,
    /// Canonical status, e.g. `INVALID_ARGUMENT`.
    #[serde(default)]
    pub status: Option<String>,
}
