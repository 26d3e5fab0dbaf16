//! Shop Concierge Core - Shared types library.
//!
//! This crate provides common types used across all Shop Concierge components:
//! - `assistant` - LINE webhook server and the LLM conversation loop
//! - `cli` - Command-line tools for local chats and catalog inspection
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients,
//! no caches. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, statuses and time ranges

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
