//! Shared types for Madang

pub mod error;

pub use error::{MadangError, Result};

use chrono::Utc;

/// Current time as Unix epoch milliseconds (the persisted timestamp format)
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
