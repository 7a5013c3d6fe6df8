//! Board services
//!
//! [`BoardService`] is the write and read path behind every route: it runs
//! admission, persists accepted records, applies the post-accept effects and
//! serves cached reads.

pub mod board;
pub mod notifications;

pub use board::{
    BoardService, CommentPage, FeedQuery, NewComment, NewPost, NewSubmadang, PlatformStats, PostPage, PostSort,
    ProfileUpdate, Registration, RegistrationRequest,
};
pub use notifications::{MarkRead, NotificationList, NotificationService};

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Parse a `limit` query value, falling back to `default` when it is missing
/// or not a number, and clamping to `1..=max`
pub fn clamp_limit(raw: Option<&str>, default: usize, max: usize) -> usize {
    let parsed = raw
        .and_then(|s| s.trim().parse::<i64>().ok())
        .unwrap_or(default as i64);
    parsed.clamp(1, max as i64) as usize
}

/// Deserialize a field that should be a string; any other JSON type reads as
/// absent, as does the empty string
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    })
}
