//! Per-agent sliding-window rate limiting
//!
//! Windows are evaluated against the timestamped records already in the
//! store, so there is no limiter state to lose on restart. The
//! check-then-write around it is not atomic: two writes racing inside the
//! same instant can both pass.

use crate::db::schemas::{COMMENT_COLLECTION, POST_COLLECTION};
use crate::store::{DocumentStore, Filter, Query};
use crate::types::{now_millis, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Write actions that are rate limited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionClass {
    Post,
    Comment,
}

impl ActionClass {
    /// Collection whose records count against the window
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Post => POST_COLLECTION,
            Self::Comment => COMMENT_COLLECTION,
        }
    }

    /// Field scoping duplicates to a board or a post
    fn scope_field(&self) -> &'static str {
        match self {
            Self::Post => "submadang",
            Self::Comment => "post_id",
        }
    }

    /// Field compared for exact duplicates
    fn text_field(&self) -> &'static str {
        match self {
            Self::Post => "title",
            Self::Comment => "content",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Denied { retry_after_secs: u64 },
}

/// Window lengths per action class
#[derive(Debug, Clone, Copy)]
pub struct RateWindows {
    pub post: Duration,
    pub comment: Duration,
}

impl Default for RateWindows {
    fn default() -> Self {
        Self {
            post: Duration::from_secs(180),
            comment: Duration::from_secs(10),
        }
    }
}

impl RateWindows {
    pub fn for_action(&self, action: ActionClass) -> Duration {
        match action {
            ActionClass::Post => self.post,
            ActionClass::Comment => self.comment,
        }
    }
}

pub struct RateLimiter {
    store: Arc<dyn DocumentStore>,
    windows: RateWindows,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn DocumentStore>, windows: RateWindows) -> Self {
        Self { store, windows }
    }

    pub fn windows(&self) -> &RateWindows {
        &self.windows
    }

    /// Check the configured window for an action
    pub async fn check(&self, agent_id: &str, action: ActionClass) -> Result<RateDecision> {
        self.check_window(agent_id, action, self.windows.for_action(action))
            .await
    }

    /// Deny if the agent has any record of this action within `window`
    pub async fn check_window(
        &self,
        agent_id: &str,
        action: ActionClass,
        window: Duration,
    ) -> Result<RateDecision> {
        self.check_window_at(agent_id, action, window, now_millis())
            .await
    }

    async fn check_window_at(
        &self,
        agent_id: &str,
        action: ActionClass,
        window: Duration,
        now: i64,
    ) -> Result<RateDecision> {
        let window_ms = window.as_millis() as i64;
        let since = now - window_ms;

        let query = Query::new()
            .filter(Filter::eq("author_id", agent_id))
            .filter(Filter::gte("created_at", since))
            .order_by_desc("created_at")
            .limit(1);

        let recent = self.store.query(action.collection(), &query).await?;
        let Some(last) = recent.first() else {
            return Ok(RateDecision::Allowed);
        };

        let last_created = last.get("created_at").and_then(Value::as_i64).unwrap_or(now);
        let retry_after_secs = retry_after(window_ms, now - last_created);

        debug!(
            agent_id = agent_id,
            action = ?action,
            retry_after_secs = retry_after_secs,
            "Rate limit window hit"
        );
        Ok(RateDecision::Denied { retry_after_secs })
    }

    /// Whether the agent already wrote exactly `text` under the same board
    /// (posts, compared by title) or post (comments, compared by content)
    pub async fn check_duplicate(
        &self,
        agent_id: &str,
        action: ActionClass,
        target_id: &str,
        text: &str,
    ) -> Result<bool> {
        let filters = [
            Filter::eq(action.scope_field(), target_id),
            Filter::eq("author_id", agent_id),
            Filter::eq(action.text_field(), text),
        ];
        let count = self.store.count_where(action.collection(), &filters).await?;
        Ok(count > 0)
    }
}

/// Whole seconds left in the window, rounded up, never below one
fn retry_after(window_ms: i64, elapsed_ms: i64) -> u64 {
    let remaining_ms = (window_ms - elapsed_ms).max(0);
    let secs = (remaining_ms + 999) / 1000;
    secs.max(1) as u64
}
