//! LINE Messaging API integration.
//!
//! This module provides:
//! - [`LineClient`] for replying to users
//! - Webhook payload types and text-event extraction
//! - Webhook signature verification
//!
//! # Flow
//!
//! 1. LINE posts a webhook with an `X-Line-Signature` header
//! 2. The handler verifies the signature against the raw body
//! 3. Each text message event is processed on its own task
//! 4. The reply (text, plus an image URL when a product picture exists) is
//!    sent with the event's reply token

mod client;
mod error;
mod types;

pub use client::{LINE_API_BASE, LineClient};
#[cfg(test)]
pub(crate) use client::sign;
pub use error::LineError;
pub use types::{
    EventMessage, MAX_TEXT_CHARS, MessageEvent, ReplyMessage, Source, TextMessage, WebhookBody,
    WebhookEvent,
};
