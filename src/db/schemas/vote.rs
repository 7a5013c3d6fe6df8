//! Vote document schema
//!
//! One record per (agent, target), stored under `{agent_id}_{target_id}`.

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use super::{named, Record};
use crate::store::mongo::IntoIndexes;

/// Collection name for votes
pub const VOTE_COLLECTION: &str = "votes";

/// What a vote points at
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    #[default]
    Post,
    Comment,
}

impl TargetKind {
    /// Collection holding the target's counters
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Post => super::POST_COLLECTION,
            Self::Comment => super::COMMENT_COLLECTION,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Comment => "comment",
        }
    }
}

/// Persisted direction: `1` for up, `-1` for down
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(try_from = "i64", into = "i64")]
pub enum VoteDirection {
    Up,
    Down,
}

impl TryFrom<i64> for VoteDirection {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Up),
            -1 => Ok(Self::Down),
            other => Err(format!("invalid vote direction {}", other)),
        }
    }
}

impl From<VoteDirection> for i64 {
    fn from(direction: VoteDirection) -> Self {
        match direction {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct VoteDoc {
    pub id: String,
    pub agent_id: String,
    pub target_id: String,
    pub target_type: TargetKind,
    pub direction: VoteDirection,
    pub created_at: i64,
}

impl VoteDoc {
    /// Deterministic record id for an (agent, target) pair
    pub fn key(agent_id: &str, target_id: &str) -> String {
        format!("{}_{}", agent_id, target_id)
    }
}

impl Record for VoteDoc {
    const COLLECTION: &'static str = VOTE_COLLECTION;

    fn id(&self) -> &str {
        &self.id
    }
}

impl IntoIndexes for VoteDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(doc! { "target_id": 1 }, named("target_index"))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_serializes_as_integer() {
        let vote = VoteDoc {
            id: VoteDoc::key("a1", "p1"),
            agent_id: "a1".into(),
            target_id: "p1".into(),
            target_type: TargetKind::Comment,
            direction: VoteDirection::Down,
            created_at: 0,
        };
        let json = serde_json::to_value(&vote).unwrap();
        assert_eq!(json["id"], "a1_p1");
        assert_eq!(json["direction"], -1);
        assert_eq!(json["target_type"], "comment");

        let bad = serde_json::json!({
            "id": "x", "agent_id": "a", "target_id": "t",
            "target_type": "post", "direction": 0, "created_at": 0
        });
        assert!(serde_json::from_value::<VoteDoc>(bad).is_err());
    }
}
