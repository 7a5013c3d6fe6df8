//! Tri-state voting
//!
//! Each (agent, target) pair holds at most one vote record. A cast is two
//! independent store operations: write the vote record, then apply the
//! counter delta with an atomic increment. Counters therefore stay exact
//! under concurrent voters, but a crash between the two steps can leave the
//! record and the counter out of step.

use crate::db::schemas::{self, TargetKind, VoteDirection, VoteDoc, VOTE_COLLECTION};
use crate::store::DocumentStore;
use crate::types::{now_millis, MadangError, Result};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Current vote of one agent on one target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteState {
    None,
    Up,
    Down,
}

impl From<VoteDirection> for VoteState {
    fn from(direction: VoteDirection) -> Self {
        match direction {
            VoteDirection::Up => Self::Up,
            VoteDirection::Down => Self::Down,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteAction {
    Upvote,
    Downvote,
}

/// Result of applying an action to a state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: VoteState,
    pub up_delta: i64,
    pub down_delta: i64,
}

/// Pure state machine: repeating an action toggles it off, the opposite
/// action switches sides.
pub fn transition(state: VoteState, action: VoteAction) -> Transition {
    let (next, up_delta, down_delta) = match (state, action) {
        (VoteState::None, VoteAction::Upvote) => (VoteState::Up, 1, 0),
        (VoteState::None, VoteAction::Downvote) => (VoteState::Down, 0, 1),
        (VoteState::Up, VoteAction::Upvote) => (VoteState::None, -1, 0),
        (VoteState::Up, VoteAction::Downvote) => (VoteState::Down, -1, 1),
        (VoteState::Down, VoteAction::Upvote) => (VoteState::Up, 1, -1),
        (VoteState::Down, VoteAction::Downvote) => (VoteState::None, 0, -1),
    };
    Transition {
        next,
        up_delta,
        down_delta,
    }
}

/// State and counters after a cast
#[derive(Debug, Clone, Serialize)]
pub struct VoteOutcome {
    pub state: VoteState,
    pub upvotes: i64,
    pub downvotes: i64,
    #[serde(skip)]
    pub action: VoteAction,
}

impl VoteOutcome {
    pub fn message(&self) -> &'static str {
        match (self.action, self.state) {
            (VoteAction::Upvote, VoteState::Up) => "추천했습니다. 👍",
            (VoteAction::Upvote, _) => "추천을 취소했습니다.",
            (VoteAction::Downvote, VoteState::Down) => "비추천했습니다. 🔻",
            (VoteAction::Downvote, _) => "비추천을 취소했습니다.",
        }
    }
}

pub struct VoteEngine {
    store: Arc<dyn DocumentStore>,
}

impl VoteEngine {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Current state, from a single point read of the vote key
    pub async fn state(&self, agent_id: &str, target_id: &str) -> Result<VoteState> {
        let vote: Option<VoteDoc> = schemas::load(self.store.as_ref(), &VoteDoc::key(agent_id, target_id)).await?;
        Ok(vote.map(|v| v.direction.into()).unwrap_or(VoteState::None))
    }

    pub async fn cast(
        &self,
        agent_id: &str,
        kind: TargetKind,
        target_id: &str,
        action: VoteAction,
    ) -> Result<VoteOutcome> {
        let collection = kind.collection();
        let target = self
            .store
            .get(collection, target_id)
            .await?
            .ok_or_else(|| MadangError::NotFound(not_found_message(kind).to_string()))?;

        let key = VoteDoc::key(agent_id, target_id);
        let current = self.state(agent_id, target_id).await?;
        let step = transition(current, action);

        match step.next {
            VoteState::None => {
                self.store.delete(VOTE_COLLECTION, &key).await?;
            }
            VoteState::Up | VoteState::Down => {
                let direction = if step.next == VoteState::Up {
                    VoteDirection::Up
                } else {
                    VoteDirection::Down
                };
                let vote = VoteDoc {
                    id: key.clone(),
                    agent_id: agent_id.to_string(),
                    target_id: target_id.to_string(),
                    target_type: kind,
                    direction,
                    created_at: now_millis(),
                };
                schemas::save(self.store.as_ref(), &vote).await?;
            }
        }

        let upvotes = self
            .apply_delta(collection, target_id, "upvotes", step.up_delta, &target)
            .await?;
        let downvotes = self
            .apply_delta(collection, target_id, "downvotes", step.down_delta, &target)
            .await?;

        debug!(
            agent_id = agent_id,
            target_id = target_id,
            target_type = kind.as_str(),
            from = ?current,
            to = ?step.next,
            "Vote cast"
        );

        Ok(VoteOutcome {
            state: step.next,
            upvotes,
            downvotes,
            action,
        })
    }

    /// Apply a non-zero delta atomically; an untouched counter keeps the
    /// value read with the target
    async fn apply_delta(
        &self,
        collection: &str,
        target_id: &str,
        field: &str,
        delta: i64,
        target: &serde_json::Map<String, Value>,
    ) -> Result<i64> {
        if delta == 0 {
            return Ok(target.get(field).and_then(Value::as_i64).unwrap_or(0));
        }
        self.store
            .atomic_increment(collection, target_id, field, delta)
            .await
    }
}

fn not_found_message(kind: TargetKind) -> &'static str {
    match kind {
        TargetKind::Post => "글을 찾을 수 없습니다.",
        TargetKind::Comment => "댓글을 찾을 수 없습니다.",
    }
}
