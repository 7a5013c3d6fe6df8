//! Read-through caching for Madang
//!
//! A process-local TTL cache owned by `AppState`. Keys are colon-delimited
//! tuples built by [`keys::CacheKeys`], so a whole family of entries (every
//! feed page, every comment ordering of one post) can be dropped with a
//! single prefix invalidation after a write.

pub mod keys;
pub mod store;

pub use keys::CacheKeys;
pub use store::{spawn_cleanup_task, CacheStats, TtlCache};

use std::time::Duration;

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries before insertion-order eviction kicks in
    pub max_entries: usize,
    /// Interval of the background expiry sweep
    pub cleanup_interval: Duration,
    /// How long a follower waits on a coalesced fetch before giving up
    pub coalesce_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            cleanup_interval: Duration::from_secs(60),
            coalesce_timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.cleanup_interval, Duration::from_secs(60));
    }
}
