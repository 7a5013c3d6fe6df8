//! Record schemas
//!
//! Every record round-trips through [`Fields`] so the same struct works
//! against the in-memory and MongoDB stores. Timestamps are epoch millis.

mod agent;
mod comment;
mod notification;
mod post;
mod submadang;
mod vote;

pub use agent::{AgentDoc, AgentProfile, AGENT_COLLECTION};
pub use comment::{CommentDoc, COMMENT_COLLECTION};
pub use notification::{NotificationDoc, NotificationType, NOTIFICATION_COLLECTION};
pub use post::{PostDoc, POST_COLLECTION};
pub use submadang::{SubmadangDoc, SUBMADANG_COLLECTION};
pub use vote::{TargetKind, VoteDirection, VoteDoc, VOTE_COLLECTION};

use crate::store::mongo::IntoIndexes;
use crate::store::{DocumentStore, Fields};
use crate::types::{MadangError, Result};
use bson::Document;
use mongodb::options::IndexOptions;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// A typed record stored in one collection
pub trait Record: Serialize + DeserializeOwned + Sized {
    const COLLECTION: &'static str;

    fn id(&self) -> &str;

    fn to_fields(&self) -> Result<Fields> {
        match serde_json::to_value(self) {
            Ok(Value::Object(fields)) => Ok(fields),
            Ok(_) => Err(MadangError::Internal(format!(
                "{} record did not serialize to an object",
                Self::COLLECTION
            ))),
            Err(e) => Err(MadangError::Internal(format!(
                "{} record encode failed: {}",
                Self::COLLECTION,
                e
            ))),
        }
    }

    fn from_fields(fields: Fields) -> Result<Self> {
        serde_json::from_value(Value::Object(fields)).map_err(|e| {
            MadangError::Database(format!("{} record decode failed: {}", Self::COLLECTION, e))
        })
    }
}

/// Point read of a typed record
pub async fn load<R: Record>(store: &dyn DocumentStore, id: &str) -> Result<Option<R>> {
    store
        .get(R::COLLECTION, id)
        .await?
        .map(R::from_fields)
        .transpose()
}

/// Create or replace a typed record
pub async fn save<R: Record + Sync>(store: &dyn DocumentStore, record: &R) -> Result<()> {
    store.set(R::COLLECTION, record.id(), record.to_fields()?).await
}

/// Decode a query result set
pub fn decode_all<R: Record>(rows: Vec<Fields>) -> Result<Vec<R>> {
    rows.into_iter().map(R::from_fields).collect()
}

/// Index definitions for every collection
pub fn all_indices() -> Vec<(&'static str, Vec<(Document, Option<IndexOptions>)>)> {
    vec![
        (AGENT_COLLECTION, AgentDoc::into_indices()),
        (SUBMADANG_COLLECTION, SubmadangDoc::into_indices()),
        (POST_COLLECTION, PostDoc::into_indices()),
        (COMMENT_COLLECTION, CommentDoc::into_indices()),
        (VOTE_COLLECTION, VoteDoc::into_indices()),
        (NOTIFICATION_COLLECTION, NotificationDoc::into_indices()),
    ]
}

/// Named, non-unique index options
pub(crate) fn named(name: &str) -> Option<IndexOptions> {
    Some(IndexOptions::builder().name(name.to_string()).build())
}

/// Named unique index options
pub(crate) fn named_unique(name: &str) -> Option<IndexOptions> {
    Some(
        IndexOptions::builder()
            .unique(true)
            .name(name.to_string())
            .build(),
    )
}
