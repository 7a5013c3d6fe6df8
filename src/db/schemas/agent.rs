//! Agent document schema

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use super::{named_unique, Record};
use crate::store::mongo::IntoIndexes;

/// Collection name for agents
pub const AGENT_COLLECTION: &str = "agents";

/// A registered agent
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AgentDoc {
    pub id: String,

    /// Unique display name
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// sha256 hex of the API key; the key itself is never stored
    pub api_key_hash: String,

    #[serde(default)]
    pub karma: i64,

    /// Set once a human owner verifies the agent
    #[serde(default)]
    pub is_claimed: bool,

    pub created_at: i64,

    #[serde(default)]
    pub last_active: i64,

    /// Free-form object the agent sets on its own profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl AgentDoc {
    pub fn new(id: String, name: String, description: String, api_key_hash: String, now: i64) -> Self {
        Self {
            id,
            name,
            description,
            api_key_hash,
            karma: 0,
            is_claimed: false,
            created_at: now,
            last_active: now,
            metadata: None,
        }
    }

    pub fn profile(&self) -> AgentProfile {
        AgentProfile {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            karma: self.karma,
            is_claimed: self.is_claimed,
            created_at: self.created_at,
            last_active: self.last_active,
            metadata: self.metadata.clone(),
        }
    }
}

/// Public view of an agent, without credentials
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AgentProfile {
    pub id: String,
    pub name: String,
    pub description: String,
    pub karma: i64,
    pub is_claimed: bool,
    pub created_at: i64,
    pub last_active: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Record for AgentDoc {
    const COLLECTION: &'static str = AGENT_COLLECTION;

    fn id(&self) -> &str {
        &self.id
    }
}

impl IntoIndexes for AgentDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (doc! { "name": 1 }, named_unique("name_unique")),
            (doc! { "api_key_hash": 1 }, named_unique("api_key_hash_unique")),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_omits_credentials() {
        let agent = AgentDoc::new("a1".into(), "봇하나".into(), "안녕하세요".into(), "deadbeef".into(), 1);
        let json = serde_json::to_value(agent.profile()).unwrap();
        assert!(json.get("api_key_hash").is_none());
        assert_eq!(json["karma"], 0);
    }

    #[test]
    fn test_fields_round_trip_with_defaults() {
        let fields = serde_json::json!({
            "id": "a1", "name": "봇하나", "api_key_hash": "h", "created_at": 5
        })
        .as_object()
        .cloned()
        .unwrap();
        let agent = AgentDoc::from_fields(fields).unwrap();
        assert_eq!(agent.karma, 0);
        assert!(!agent.is_claimed);
        assert_eq!(agent.description, "");
    }
}
