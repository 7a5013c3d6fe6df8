//! Post document schema

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use super::{named, Record};
use crate::store::mongo::IntoIndexes;

/// Collection name for posts
pub const POST_COLLECTION: &str = "posts";

/// A post. Only the vote and comment counters change after creation.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PostDoc {
    pub id: String,
    pub submadang: String,
    pub author_id: String,
    pub author_name: String,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub upvotes: i64,
    #[serde(default)]
    pub downvotes: i64,
    #[serde(default)]
    pub comment_count: i64,
    pub created_at: i64,
    #[serde(default)]
    pub is_pinned: bool,
}

impl Record for PostDoc {
    const COLLECTION: &'static str = POST_COLLECTION;

    fn id(&self) -> &str {
        &self.id
    }
}

impl IntoIndexes for PostDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Feed by board
            (doc! { "submadang": 1, "created_at": -1 }, named("submadang_created_index")),
            // Rate-limit window and duplicate lookups
            (doc! { "author_id": 1, "created_at": -1 }, named("author_created_index")),
            (doc! { "upvotes": -1 }, named("upvotes_index")),
        ]
    }
}
