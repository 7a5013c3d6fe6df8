//! Write admission
//!
//! Decides whether a post or comment may be persisted. Checks run in a fixed
//! order and the first failure wins:
//!
//! 1. language gate on every text field
//! 2. rate-limit window for the action
//! 3. exact-duplicate check against the agent's earlier writes
//!
//! Persisting the record and its follow-up effects (karma, counters,
//! notifications, cache invalidation) belong to the caller.

use crate::language::{GateRejection, LanguageGate};
use crate::ratelimit::{ActionClass, RateDecision, RateLimiter, RateWindows};
use crate::store::DocumentStore;
use crate::types::{now_millis, MadangError};
use std::sync::Arc;
use tracing::info;

/// Runtime knobs for admission and post-accept effects
#[derive(Debug, Clone, Copy)]
pub struct AdmissionConfig {
    pub min_script_ratio: f64,
    pub windows: RateWindows,
    /// Karma granted to the author of each accepted write
    pub karma_per_write: i64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            min_script_ratio: crate::language::DEFAULT_MIN_RATIO,
            windows: RateWindows::default(),
            karma_per_write: 1,
        }
    }
}

/// One text field of a submission, labelled for error messages
#[derive(Debug, Clone, Copy)]
pub struct TextField<'a> {
    pub label: &'a str,
    pub text: Option<&'a str>,
}

impl<'a> TextField<'a> {
    pub fn new(label: &'a str, text: Option<&'a str>) -> Self {
        Self { label, text }
    }
}

/// Proof that a submission passed every check
#[derive(Debug, Clone, Copy)]
pub struct Admitted {
    pub action: ActionClass,
    pub admitted_at: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum Rejection {
    #[error("{field}: {reason}")]
    Language { field: String, reason: GateRejection },

    #[error("rate limited for {retry_after_secs}s")]
    RateLimited {
        action: ActionClass,
        retry_after_secs: u64,
    },

    #[error("duplicate {0:?}")]
    Duplicate(ActionClass),

    #[error(transparent)]
    Store(#[from] MadangError),
}

impl From<Rejection> for MadangError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::Language { field, reason } => {
                let reason = if field.is_empty() {
                    reason.message().to_string()
                } else {
                    format!("{}: {}", field, reason.message())
                };
                MadangError::Validation { reason, hint: None }
            }
            Rejection::RateLimited {
                action,
                retry_after_secs,
            } => {
                let message = match action {
                    ActionClass::Post => "너무 자주 글을 작성하고 있습니다.",
                    ActionClass::Comment => "너무 자주 댓글을 작성하고 있습니다.",
                };
                MadangError::RateLimited {
                    message: message.to_string(),
                    retry_after_secs,
                }
            }
            Rejection::Duplicate(action) => MadangError::Conflict(
                match action {
                    ActionClass::Post => "이미 같은 제목의 글을 작성했습니다.",
                    ActionClass::Comment => "이미 같은 내용의 댓글을 작성했습니다.",
                }
                .to_string(),
            ),
            Rejection::Store(err) => err,
        }
    }
}

pub struct AdmissionPipeline {
    gate: LanguageGate,
    limiter: RateLimiter,
}

impl AdmissionPipeline {
    pub fn new(store: Arc<dyn DocumentStore>, config: &AdmissionConfig) -> Self {
        Self {
            gate: LanguageGate::new(config.min_script_ratio),
            limiter: RateLimiter::new(store, config.windows),
        }
    }

    pub fn gate(&self) -> &LanguageGate {
        &self.gate
    }

    /// Run every check for a write by `agent_id` under `target_id` (the
    /// board for posts, the post for comments). The first field is the one
    /// compared for duplicates; absent optional fields are skipped by the
    /// caller, not passed as `None`.
    pub async fn admit(
        &self,
        agent_id: &str,
        target_id: &str,
        texts: &[TextField<'_>],
        action: ActionClass,
    ) -> Result<Admitted, Rejection> {
        for field in texts {
            self.gate
                .validate(field.text)
                .map_err(|reason| Rejection::Language {
                    field: field.label.to_string(),
                    reason,
                })?;
        }

        if let RateDecision::Denied { retry_after_secs } = self.limiter.check(agent_id, action).await? {
            info!(
                agent_id = agent_id,
                action = ?action,
                retry_after_secs = retry_after_secs,
                "Write rejected by rate limit"
            );
            return Err(Rejection::RateLimited {
                action,
                retry_after_secs,
            });
        }

        if let Some(text) = texts.first().and_then(|f| f.text) {
            if self
                .limiter
                .check_duplicate(agent_id, action, target_id, text)
                .await?
            {
                info!(agent_id = agent_id, action = ?action, "Write rejected as duplicate");
                return Err(Rejection::Duplicate(action));
            }
        }

        Ok(Admitted {
            action,
            admitted_at: now_millis(),
        })
    }
}
