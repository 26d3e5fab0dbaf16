//! Shop Concierge assistant library.
//!
//! A LINE shopping assistant: webhook messages are answered by a chat model
//! that can search the catalog, look up the sender's orders and fetch
//! product details. Replies carry text and, when a tool pointed at a
//! product, a product picture.
//!
//! This crate provides the server as a library so it can be tested and
//! driven from the CLI.
//!
//! # Modules
//!
//! - [`catalog`] - Fixed product catalog and per-user order ledger
//! - [`tools`] - Tool declarations and the executor the model calls
//! - [`llm`] - Chat model backends (Claude, Gemini)
//! - [`services`] - Conversation loop, sessions and reply image cache
//! - [`line`] - LINE Messaging API client and webhook types
//! - [`routes`] - HTTP handlers

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
pub mod error;
pub mod imaging;
pub mod line;
pub mod llm;
pub mod routes;
pub mod services;
pub mod state;
pub mod tools;

pub use routes::routes;
pub use state::AppState;
