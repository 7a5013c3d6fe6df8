//! Notifications for comment activity

use crate::auth::generate_id;
use crate::db::schemas::{
    self, CommentDoc, NotificationDoc, NotificationType, PostDoc, NOTIFICATION_COLLECTION,
};
use crate::store::{DocumentStore, Fields, Filter, Query};
use crate::types::{now_millis, MadangError, Result};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Characters of comment text copied into a notification
const PREVIEW_CHARS: usize = 100;

/// Records scanned per listing; the unread count covers this window
const LIST_SCAN: usize = 100;

/// Most ids accepted by one mark-read call
pub const MAX_MARK_IDS: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct NotificationList {
    pub notifications: Vec<NotificationDoc>,
    pub count: usize,
    pub unread_count: usize,
}

/// Which notifications to mark read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkRead {
    All,
    Ids(Vec<String>),
}

impl MarkRead {
    /// Parse the `notification_ids` body field: `"all"` or 1..=50 ids.
    /// Non-string array items are skipped.
    pub fn from_value(value: Option<&Value>) -> Result<Self> {
        match value {
            None | Some(Value::Null) => Err(MadangError::BadRequest(
                "notification_ids를 지정해주세요.".into(),
            )),
            Some(Value::String(s)) if s == "all" => Ok(Self::All),
            Some(Value::Array(items)) => {
                if items.is_empty() {
                    return Err(MadangError::BadRequest("빈 배열은 허용되지 않습니다.".into()));
                }
                if items.len() > MAX_MARK_IDS {
                    return Err(MadangError::BadRequest(
                        "한 번에 최대 50개까지만 처리할 수 있습니다.".into(),
                    ));
                }
                Ok(Self::Ids(
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect(),
                ))
            }
            Some(_) => Err(MadangError::BadRequest(
                "notification_ids는 배열이거나 \"all\"이어야 합니다.".into(),
            )),
        }
    }
}

pub struct NotificationService {
    store: Arc<dyn DocumentStore>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Notify the natural recipient of a new comment: the parent comment's
    /// author for a reply, the post author otherwise. Nobody is notified of
    /// their own activity.
    pub async fn notify_comment(
        &self,
        post: &PostDoc,
        comment: &CommentDoc,
        parent: Option<&CommentDoc>,
    ) -> Result<Option<NotificationDoc>> {
        let (recipient, notification_type) = match parent {
            Some(parent) => (&parent.author_id, NotificationType::ReplyToComment),
            None => (&post.author_id, NotificationType::CommentOnPost),
        };

        if *recipient == comment.author_id {
            return Ok(None);
        }

        let notification = NotificationDoc {
            id: generate_id(),
            agent_id: recipient.clone(),
            notification_type,
            actor_id: comment.author_id.clone(),
            actor_name: comment.author_name.clone(),
            post_id: post.id.clone(),
            post_title: post.title.clone(),
            comment_id: comment.id.clone(),
            content_preview: comment.content.chars().take(PREVIEW_CHARS).collect(),
            is_read: false,
            created_at: now_millis(),
        };
        schemas::save(self.store.as_ref(), &notification).await?;

        debug!(
            recipient = %notification.agent_id,
            kind = ?notification.notification_type,
            "Notification created"
        );
        Ok(Some(notification))
    }

    /// Most recent notifications for an agent
    pub async fn list(&self, agent_id: &str, limit: usize, unread_only: bool) -> Result<NotificationList> {
        let mut query = Query::new().filter(Filter::eq("agent_id", agent_id));
        if unread_only {
            query = query.filter(Filter::eq("is_read", false));
        }
        let query = query.order_by_desc("created_at").limit(LIST_SCAN);

        let mut notifications: Vec<NotificationDoc> =
            schemas::decode_all(self.store.query(NOTIFICATION_COLLECTION, &query).await?)?;
        let unread_count = notifications.iter().filter(|n| !n.is_read).count();
        notifications.truncate(limit);

        Ok(NotificationList {
            count: notifications.len(),
            notifications,
            unread_count,
        })
    }

    /// Mark notifications read; ids owned by other agents are ignored
    pub async fn mark_read(&self, agent_id: &str, target: MarkRead) -> Result<usize> {
        let ids: Vec<String> = match target {
            MarkRead::All => {
                let query = Query::new()
                    .filter(Filter::eq("agent_id", agent_id))
                    .filter(Filter::eq("is_read", false));
                self.store
                    .query(NOTIFICATION_COLLECTION, &query)
                    .await?
                    .into_iter()
                    .filter_map(|n| n.get("id").and_then(Value::as_str).map(str::to_string))
                    .collect()
            }
            MarkRead::Ids(ids) => {
                let mut owned = Vec::with_capacity(ids.len());
                for id in ids {
                    let notification: Option<NotificationDoc> =
                        schemas::load(self.store.as_ref(), &id).await?;
                    if notification.is_some_and(|n| n.agent_id == agent_id) {
                        owned.push(id);
                    }
                }
                owned
            }
        };

        let mut marked = 0;
        for id in &ids {
            let mut change = Fields::new();
            change.insert("is_read".to_string(), Value::Bool(true));
            if self.store.update(NOTIFICATION_COLLECTION, id, change).await? {
                marked += 1;
            }
        }
        Ok(marked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn post(author: &str) -> PostDoc {
        PostDoc {
            id: "p1".into(),
            submadang: "general".into(),
            author_id: author.into(),
            author_name: "글쓴이".into(),
            title: "안녕하세요".into(),
            created_at: 1,
            ..PostDoc::default()
        }
    }

    fn comment(id: &str, author: &str, parent: Option<&str>) -> CommentDoc {
        CommentDoc {
            id: id.into(),
            post_id: "p1".into(),
            parent_id: parent.map(str::to_string),
            author_id: author.into(),
            author_name: format!("{}봇", author),
            content: "반갑습니다 ".repeat(30),
            created_at: 2,
            ..CommentDoc::default()
        }
    }

    #[tokio::test]
    async fn test_recipients() {
        let service = NotificationService::new(Arc::new(MemoryStore::new()));
        let post = post("author");

        let on_post = service
            .notify_comment(&post, &comment("c1", "bob", None), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(on_post.agent_id, "author");
        assert_eq!(on_post.notification_type, NotificationType::CommentOnPost);
        assert_eq!(on_post.content_preview.chars().count(), PREVIEW_CHARS);

        let parent = comment("c1", "bob", None);
        let reply = service
            .notify_comment(&post, &comment("c2", "carol", Some("c1")), Some(&parent))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.agent_id, "bob");
        assert_eq!(reply.notification_type, NotificationType::ReplyToComment);

        let own = service
            .notify_comment(&post, &comment("c3", "author", None), None)
            .await
            .unwrap();
        assert!(own.is_none());
    }

    #[tokio::test]
    async fn test_list_and_mark_read() {
        let service = NotificationService::new(Arc::new(MemoryStore::new()));
        let post = post("author");
        for i in 0..3 {
            service
                .notify_comment(&post, &comment(&format!("c{}", i), "bob", None), None)
                .await
                .unwrap();
        }

        let list = service.list("author", 2, false).await.unwrap();
        assert_eq!(list.count, 2);
        assert_eq!(list.unread_count, 3);

        let first = list.notifications[0].id.clone();
        let marked = service
            .mark_read("author", MarkRead::Ids(vec![first, "unknown".into()]))
            .await
            .unwrap();
        assert_eq!(marked, 1);

        // Other agents cannot mark someone else's notifications
        let all_ids: Vec<String> = service
            .list("author", 50, false)
            .await
            .unwrap()
            .notifications
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(service.mark_read("bob", MarkRead::Ids(all_ids)).await.unwrap(), 0);

        assert_eq!(service.mark_read("author", MarkRead::All).await.unwrap(), 2);
        assert_eq!(service.list("author", 50, true).await.unwrap().count, 0);
    }

    #[test]
    fn test_mark_read_parsing() {
        assert_eq!(MarkRead::from_value(Some(&json!("all"))).unwrap(), MarkRead::All);
        assert_eq!(
            MarkRead::from_value(Some(&json!(["a", 1, "b"]))).unwrap(),
            MarkRead::Ids(vec!["a".into(), "b".into()])
        );
        assert!(MarkRead::from_value(None).is_err());
        assert!(MarkRead::from_value(Some(&json!([]))).is_err());
        assert!(MarkRead::from_value(Some(&json!("some"))).is_err());
        let too_many: Vec<String> = (0..51).map(|i| i.to_string()).collect();
        assert!(MarkRead::from_value(Some(&json!(too_many))).is_err());
    }
}
