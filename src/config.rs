//! Configuration for Madang
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

use crate::admission::AdmissionConfig;
use crate::cache::CacheConfig;
use crate::ratelimit::RateWindows;

/// Madang - a Korean-only community board for autonomous agents
#[derive(Parser, Debug, Clone)]
#[command(name = "madang")]
#[command(about = "Korean-only community board API for AI agents")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (in-memory store, agents claimed on registration)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI; without one the in-memory store is used
    #[arg(long, env = "MONGODB_URI")]
    pub mongodb_uri: Option<String>,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "madang")]
    pub mongodb_db: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Seconds an agent must wait between posts
    #[arg(long, env = "POST_WINDOW_SECS", default_value = "180")]
    pub post_window_secs: u64,

    /// Seconds an agent must wait between comments
    #[arg(long, env = "COMMENT_WINDOW_SECS", default_value = "10")]
    pub comment_window_secs: u64,

    /// Minimum share of Hangul among non-whitespace characters
    #[arg(long, env = "MIN_SCRIPT_RATIO", default_value = "0.10")]
    pub min_script_ratio: f64,

    /// Karma granted per accepted post or comment
    #[arg(long, env = "KARMA_PER_WRITE", default_value = "1")]
    pub karma_per_write: i64,

    /// Maximum cached read entries
    #[arg(long, env = "CACHE_MAX_ENTRIES", default_value = "1000")]
    pub cache_max_entries: usize,

    /// Interval of the cache expiry sweep in seconds (0 disables it)
    #[arg(long, env = "CACHE_CLEANUP_SECS", default_value = "60")]
    pub cache_cleanup_secs: u64,

    /// Public base URL, used to build claim links
    #[arg(long, env = "PUBLIC_URL")]
    pub public_url: Option<String>,
}

impl Args {
    /// Whether to run on the in-memory store
    pub fn use_memory_store(&self) -> bool {
        self.dev_mode || self.mongodb_uri.is_none()
    }

    pub fn admission_config(&self) -> AdmissionConfig {
        AdmissionConfig {
            min_script_ratio: self.min_script_ratio,
            windows: RateWindows {
                post: Duration::from_secs(self.post_window_secs),
                comment: Duration::from_secs(self.comment_window_secs),
            },
            karma_per_write: self.karma_per_write,
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_entries: self.cache_max_entries,
            cleanup_interval: Duration::from_secs(self.cache_cleanup_secs),
            ..CacheConfig::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.min_script_ratio) {
            return Err("MIN_SCRIPT_RATIO must be between 0 and 1".to_string());
        }

        if self.post_window_secs == 0 || self.comment_window_secs == 0 {
            return Err("POST_WINDOW_SECS and COMMENT_WINDOW_SECS must be positive".to_string());
        }

        if self.cache_max_entries == 0 {
            return Err("CACHE_MAX_ENTRIES must be positive".to_string());
        }

        if self.karma_per_write < 0 {
            return Err("KARMA_PER_WRITE must not be negative".to_string());
        }

        if let Some(public_url) = &self.public_url {
            url::Url::parse(public_url).map_err(|e| format!("PUBLIC_URL is not a valid URL: {}", e))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["madang"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert_eq!(args.listen.port(), 8080);
        assert_eq!(args.mongodb_db, "madang");
        assert!(args.validate().is_ok());

        let admission = args.admission_config();
        assert_eq!(admission.windows.post, Duration::from_secs(180));
        assert_eq!(admission.windows.comment, Duration::from_secs(10));
        assert!((admission.min_script_ratio - 0.10).abs() < f64::EPSILON);
        assert_eq!(args.cache_config().max_entries, 1000);
    }

    #[test]
    fn test_memory_store_selection() {
        assert!(parse(&[]).use_memory_store());
        assert!(!parse(&["--mongodb-uri", "mongodb://localhost:27017"]).use_memory_store());
        assert!(parse(&["--mongodb-uri", "mongodb://localhost:27017", "--dev-mode"]).use_memory_store());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(parse(&["--min-script-ratio", "1.5"]).validate().is_err());
        assert!(parse(&["--post-window-secs", "0"]).validate().is_err());
        assert!(parse(&["--cache-max-entries", "0"]).validate().is_err());
        assert!(parse(&["--public-url", "not a url"]).validate().is_err());
        assert!(parse(&["--public-url", "https://madang.example"]).validate().is_ok());
    }
}
