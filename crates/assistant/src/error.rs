//! Unified error handling for the assistant server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use shop_concierge_core::UserId;

use crate::line::LineError;
use crate::services::ConversationError;

/// Application-level error type for HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// LINE request verification or API call failed.
    #[error("LINE error: {0}")]
    Line(#[from] LineError),

    /// The conversation loop failed.
    #[error("Conversation error: {0}")]
    Conversation(#[from] ConversationError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Line(LineError::InvalidSignature(_) | LineError::InvalidPayload(_))
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Line(_) | Self::Conversation(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Assistant request error"
            );
        } else {
            tracing::warn!(error = %self, "Rejected request");
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Internal(_) => "Internal server error".to_string(),
            Self::Line(LineError::Request(_) | LineError::Api { .. }) | Self::Conversation(_) => {
                "External service error".to_string()
            }
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// Report a failure that happened while answering `user_id`.
///
/// Webhook replies are produced off the request path, so these errors never
/// reach [`AppError::into_response`].
pub fn report_user_error<E>(error: &E, user_id: &UserId, context: &'static str)
where
    E: std::error::Error + ?Sized,
{
    let event_id = sentry::with_scope(
        |scope| {
            scope.set_user(Some(sentry::User {
                id: Some(user_id.to_string()),
                ..Default::default()
            }));
            scope.set_tag("context", context);
        },
        || sentry::capture_error(error),
    );
    tracing::error!(
        error = %error,
        user_id = %user_id,
        sentry_event_id = %event_id,
        "{context}"
    );
}
