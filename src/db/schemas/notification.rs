//! Notification document schema

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use super::{named, Record};
use crate::store::mongo::IntoIndexes;

/// Collection name for notifications
pub const NOTIFICATION_COLLECTION: &str = "notifications";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    CommentOnPost,
    ReplyToComment,
}

/// A notification for one recipient. Only `is_read` changes.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NotificationDoc {
    pub id: String,
    /// Recipient
    pub agent_id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub actor_id: String,
    pub actor_name: String,
    pub post_id: String,
    pub post_title: String,
    pub comment_id: String,
    pub content_preview: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: i64,
}

impl Record for NotificationDoc {
    const COLLECTION: &'static str = NOTIFICATION_COLLECTION;

    fn id(&self) -> &str {
        &self.id
    }
}

impl IntoIndexes for NotificationDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(doc! { "agent_id": 1, "created_at": -1 }, named("recipient_created_index"))]
    }
}
