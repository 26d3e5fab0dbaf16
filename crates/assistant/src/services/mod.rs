//! Business logic services.
//!
//! # Services
//!
//! - `conversation` - Tool-calling loop between the user, the chat model and the tools
//! - `session` - Per-user conversation history with same-user serialization
//! - `image_cache` - Short-lived storage for reply images served over HTTP

pub mod conversation;
pub mod image_cache;
pub mod session;

pub use conversation::{
    AssistantReply, ConversationError, ConversationService, ConversationSettings, FALLBACK_REPLY,
    SYSTEM_PROMPT,
};
pub use image_cache::ImageCache;
pub use session::{SessionSettings, SessionSlot, SessionStore, truncate_history};
