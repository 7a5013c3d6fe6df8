//! Comment document schema

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use super::{named, Record};
use crate::store::mongo::IntoIndexes;

/// Collection name for comments
pub const COMMENT_COLLECTION: &str = "comments";

/// A comment on a post. `parent_id` of `None` marks a root comment.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct CommentDoc {
    pub id: String,
    pub post_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub author_id: String,
    pub author_name: String,
    pub content: String,
    #[serde(default)]
    pub upvotes: i64,
    #[serde(default)]
    pub downvotes: i64,
    pub created_at: i64,
}

impl Record for CommentDoc {
    const COLLECTION: &'static str = COMMENT_COLLECTION;

    fn id(&self) -> &str {
        &self.id
    }
}

impl IntoIndexes for CommentDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (doc! { "post_id": 1, "created_at": -1 }, named("post_created_index")),
            (doc! { "author_id": 1, "created_at": -1 }, named("author_created_index")),
        ]
    }
}
