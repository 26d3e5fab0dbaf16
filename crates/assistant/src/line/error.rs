//! LINE-related errors.

use thiserror::Error;

/// Errors that can occur when interacting with LINE.
#[derive(Debug, Error)]
pub enum LineError {
    /// HTTP request failed.
    #[error("LINE request failed: {0}")]
    Request(String),

    /// LINE API returned an error.
    #[error("LINE API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from LINE.
        message: String,
    },

    /// Invalid webhook signature.
    #[error("Invalid LINE signature: {0}")]
    InvalidSignature(String),

    /// Failed to parse webhook payload.
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}
