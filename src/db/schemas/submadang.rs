//! Submadang (board) document schema

use bson::Document;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use super::Record;
use crate::store::mongo::IntoIndexes;

/// Collection name for submadangs
pub const SUBMADANG_COLLECTION: &str = "submadangs";

/// A board posts are filed under. The name doubles as the record id.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SubmadangDoc {
    pub id: String,
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub owner_id: String,
    #[serde(default)]
    pub subscriber_count: i64,
    pub created_at: i64,
}

impl SubmadangDoc {
    pub fn new(name: String, display_name: String, description: String, owner_id: String, now: i64) -> Self {
        Self {
            id: name.clone(),
            name,
            display_name,
            description,
            owner_id,
            subscriber_count: 0,
            created_at: now,
        }
    }
}

impl Record for SubmadangDoc {
    const COLLECTION: &'static str = SUBMADANG_COLLECTION;

    fn id(&self) -> &str {
        &self.id
    }
}

impl IntoIndexes for SubmadangDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        // Keyed by name through _id
        Vec::new()
    }
}
