//! Core types for Shop Concierge.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod price;
pub mod status;
pub mod time_range;

pub use id::*;
pub use price::Price;
pub use status::*;
pub use time_range::{TimeRange, TimeRangeError};
