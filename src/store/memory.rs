//! In-memory document store
//!
//! Used in dev mode and tests. Each collection is a `DashMap`; an increment
//! holds the shard lock of its record for the read-modify-write, which gives
//! the same per-record atomicity as a server-side `$inc`.

use super::{compare_values, DocumentStore, Fields, Filter, Query};
use crate::types::{MadangError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<String, DashMap<String, Fields>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a collection
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn matching(&self, collection: &str, filters: &[Filter]) -> Vec<Fields> {
        let Some(records) = self.collections.get(collection) else {
            return Vec::new();
        };
        records
            .iter()
            .filter(|entry| filters.iter().all(|f| f.matches(entry.value())))
            .map(|entry| entry.value().clone())
            .collect()
    }
}

fn record_id(record: &Fields) -> &str {
    record.get("id").and_then(Value::as_str).unwrap_or("")
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Fields>> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|records| records.get(id).map(|r| r.value().clone())))
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Fields>> {
        let mut results = self.matching(collection, &query.filters);

        results.sort_by(|a, b| {
            let primary = query
                .order_by
                .as_ref()
                .map(|order| {
                    let null = Value::Null;
                    let av = a.get(&order.field).unwrap_or(&null);
                    let bv = b.get(&order.field).unwrap_or(&null);
                    let ord = compare_values(av, bv).unwrap_or(Ordering::Equal);
                    if order.descending {
                        ord.reverse()
                    } else {
                        ord
                    }
                })
                .unwrap_or(Ordering::Equal);
            primary.then_with(|| record_id(a).cmp(record_id(b)))
        });

        if let Some(cursor) = &query.start_after {
            if let Some(pos) = results.iter().position(|r| record_id(r) == cursor) {
                results.drain(..=pos);
            }
        }

        if let Some(limit) = query.limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    async fn set(&self, collection: &str, id: &str, mut fields: Fields) -> Result<()> {
        fields.insert("id".to_string(), Value::String(id.to_string()));
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<bool> {
        let Some(records) = self.collections.get(collection) else {
            return Ok(false);
        };
        let Some(mut record) = records.get_mut(id) else {
            return Ok(false);
        };
        for (key, value) in fields {
            if key != "id" {
                record.insert(key, value);
            }
        }
        Ok(true)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        Ok(self
            .collections
            .get(collection)
            .map(|records| records.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn atomic_increment(&self, collection: &str, id: &str, field: &str, delta: i64) -> Result<i64> {
        let not_found = || MadangError::NotFound(format!("{}/{} not found", collection, id));

        let records = self.collections.get(collection).ok_or_else(not_found)?;
        let mut record = records.get_mut(id).ok_or_else(not_found)?;

        let current = record.get(field).and_then(Value::as_i64).unwrap_or(0);
        let next = current + delta;
        record.insert(field.to_string(), Value::from(next));
        Ok(next)
    }

    async fn count_where(&self, collection: &str, filters: &[Filter]) -> Result<u64> {
        Ok(self.matching(collection, filters).len() as u64)
    }

    async fn sum_where(&self, collection: &str, filters: &[Filter], field: &str) -> Result<i64> {
        Ok(self
            .matching(collection, filters)
            .iter()
            .filter_map(|record| record.get(field).and_then(Value::as_i64))
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_set_get_update_delete() {
        let store = MemoryStore::new();
        store
            .set("posts", "p1", fields(json!({ "title": "안녕", "upvotes": 0 })))
            .await
            .unwrap();

        let post = store.get("posts", "p1").await.unwrap().unwrap();
        assert_eq!(post["id"], "p1");
        assert_eq!(post["title"], "안녕");

        assert!(store.update("posts", "p1", fields(json!({ "title": "반가워" }))).await.unwrap());
        assert!(!store.update("posts", "nope", fields(json!({ "title": "x" }))).await.unwrap());
        assert_eq!(store.get("posts", "p1").await.unwrap().unwrap()["title"], "반가워");

        assert!(store.delete("posts", "p1").await.unwrap());
        assert!(!store.delete("posts", "p1").await.unwrap());
        assert!(store.get("posts", "p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_order_filter_cursor() {
        let store = MemoryStore::new();
        for (id, created, author) in [("a", 1, "x"), ("b", 3, "x"), ("c", 2, "y"), ("d", 4, "x")] {
            store
                .set("posts", id, fields(json!({ "created_at": created, "author_id": author })))
                .await
                .unwrap();
        }

        let query = Query::new()
            .filter(Filter::eq("author_id", "x"))
            .order_by_desc("created_at");
        let ids: Vec<String> = store
            .query("posts", &query)
            .await
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["d", "b", "a"]);

        let page = store
            .query("posts", &query.clone().start_after(Some("d")).limit(1))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0]["id"], "b");

        assert_eq!(store.count_where("posts", &[Filter::eq("author_id", "x")]).await.unwrap(), 3);
        assert_eq!(store.sum_where("posts", &[], "created_at").await.unwrap(), 10);
        assert_eq!(store.sum_where("posts", &[Filter::eq("author_id", "y")], "created_at").await.unwrap(), 2);
        assert_eq!(store.sum_where("posts", &[], "upvotes").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_atomic_increment() {
        let store = MemoryStore::new();
        store.set("posts", "p1", Fields::new()).await.unwrap();

        assert_eq!(store.atomic_increment("posts", "p1", "upvotes", 1).await.unwrap(), 1);
        assert_eq!(store.atomic_increment("posts", "p1", "upvotes", -1).await.unwrap(), 0);

        let missing = store.atomic_increment("posts", "nope", "upvotes", 1).await;
        assert!(matches!(missing, Err(MadangError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        store.set("posts", "p1", Fields::new()).await.unwrap();

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.atomic_increment("posts", "p1", "upvotes", 1).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let post = store.get("posts", "p1").await.unwrap().unwrap();
        assert_eq!(post["upvotes"], 50);
    }
}
