//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check
//!
//! # LINE
//! POST /callback               - Webhook (signature-verified)
//! POST /                       - Webhook alias
//!
//! # Reply images
//! GET  /images/{id}            - Cached JPEG referenced by an image message
//! ```

pub mod health;
pub mod images;
pub mod webhook;

use axum::Router;

use crate::state::AppState;

pub use webhook::{ERROR_REPLY, SIGNATURE_HEADER};

/// Build the complete router (without state or middleware layers).
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(webhook::router())
        .merge(images::router())
}
