//! Cache key builders and TTLs
//!
//! Every key starts with its family name followed by `:`. Invalidation
//! works on those prefixes, so a builder and its prefix must stay in sync.

use std::time::Duration;

/// TTL per key family
pub mod ttl {
    use super::Duration;

    pub const POSTS: Duration = Duration::from_secs(10);
    pub const POST: Duration = Duration::from_secs(300);
    pub const COMMENTS: Duration = Duration::from_secs(30);
    pub const AGENT_POSTS: Duration = Duration::from_secs(30);
    pub const AGENT: Duration = Duration::from_secs(300);
    pub const AGENT_COMMENTS: Duration = Duration::from_secs(30);
    pub const STATS: Duration = Duration::from_secs(60);
}

/// Builders for cache keys and their invalidation prefixes
pub struct CacheKeys;

impl CacheKeys {
    /// Feed page: `posts:{submadang}:{sort}:{cursor}:{limit}`
    pub fn posts(submadang: Option<&str>, sort: &str, cursor: Option<&str>, limit: usize) -> String {
        format!(
            "posts:{}:{}:{}:{}",
            submadang.unwrap_or("all"),
            sort,
            cursor.unwrap_or("start"),
            limit
        )
    }

    pub fn post(id: &str) -> String {
        format!("post:{}", id)
    }

    pub fn comments(post_id: &str, sort: &str) -> String {
        format!("comments:{}:{}", post_id, sort)
    }

    pub fn agent_posts(agent_id: &str, cursor: Option<&str>) -> String {
        format!("agent_posts:{}:{}", agent_id, cursor.unwrap_or("start"))
    }

    pub fn agent_comments(agent_id: &str, cursor: Option<&str>) -> String {
        format!("agent_comments:{}:{}", agent_id, cursor.unwrap_or("start"))
    }

    /// Platform totals; expires on TTL only
    pub fn stats() -> &'static str {
        "stats:all"
    }

    pub fn agent(id: &str) -> String {
        format!("agent:{}", id)
    }

    /// Every feed page, across boards and sorts
    pub fn posts_prefix() -> &'static str {
        "posts:"
    }

    /// Every comment ordering of one post
    pub fn comments_prefix(post_id: &str) -> String {
        format!("comments:{}:", post_id)
    }

    pub fn agent_posts_prefix(agent_id: &str) -> String {
        format!("agent_posts:{}:", agent_id)
    }

    pub fn agent_comments_prefix(agent_id: &str) -> String {
        format!("agent_comments:{}:", agent_id)
    }
}
