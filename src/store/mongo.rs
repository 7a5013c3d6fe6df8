//! MongoDB-backed document store
//!
//! Records live in untyped `Document` collections with the record id as
//! `_id`. Increments are a single `find_one_and_update` with `$inc`, so
//! concurrent voters never lose updates.

use super::{DocumentStore, Fields, Filter, FilterOp, Query};
use crate::db::schemas;
use crate::types::{MadangError, Result};
use async_trait::async_trait;
use bson::{doc, Bson, Document};
use futures_util::TryStreamExt;
use mongodb::{
    options::{IndexOptions, ReturnDocument},
    Client, Collection, Database, IndexModel,
};
use serde_json::Value;
use tracing::{debug, info};

/// Schemas that declare their collection indexes
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Connect, verify with a ping and apply schema indexes
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        // Fail fast instead of hanging on an unreachable server
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| MadangError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        let db = client.database(db_name);
        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| MadangError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        let store = Self { db };
        store.apply_indexes().await?;
        Ok(store)
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection::<Document>(name)
    }

    async fn apply_indexes(&self) -> Result<()> {
        for (collection, schema_indices) in schemas::all_indices() {
            if schema_indices.is_empty() {
                continue;
            }
            let indices: Vec<IndexModel> = schema_indices
                .into_iter()
                .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
                .collect();

            self.collection(collection)
                .create_indexes(indices)
                .await
                .map_err(|e| MadangError::Database(format!("Failed to create indexes: {}", e)))?;
            debug!(collection = collection, "Indexes applied");
        }
        Ok(())
    }

    /// Translate the cursor into a range filter on the sort key
    async fn cursor_filter(&self, collection: &str, query: &Query) -> Result<Option<Document>> {
        let Some(cursor_id) = &query.start_after else {
            return Ok(None);
        };

        let Some(order) = &query.order_by else {
            return Ok(Some(doc! { "_id": { "$gt": cursor_id.as_str() } }));
        };

        let Some(cursor_doc) = self.collection(collection).find_one(doc! { "_id": cursor_id.as_str() }).await? else {
            return Ok(None);
        };
        let pivot = cursor_doc.get(&order.field).cloned().unwrap_or(Bson::Null);
        let past = if order.descending { "$lt" } else { "$gt" };

        Ok(Some(doc! {
            "$or": [
                { order.field.as_str(): { past: pivot.clone() } },
                { order.field.as_str(): pivot, "_id": { "$gt": cursor_id.as_str() } },
            ]
        }))
    }
}

fn field_name(field: &str) -> &str {
    if field == "id" {
        "_id"
    } else {
        field
    }
}

fn filter_document(filters: &[Filter]) -> Result<Document> {
    let mut clauses = Vec::with_capacity(filters.len());
    for filter in filters {
        let value = bson::to_bson(&filter.value)?;
        let field = field_name(&filter.field);
        let clause = match filter.op {
            FilterOp::Eq => doc! { field: value },
            FilterOp::Gt => doc! { field: { "$gt": value } },
            FilterOp::Gte => doc! { field: { "$gte": value } },
            FilterOp::Lt => doc! { field: { "$lt": value } },
        };
        clauses.push(clause);
    }

    Ok(match clauses.len() {
        0 => Document::new(),
        1 => clauses.remove(0),
        _ => doc! { "$and": clauses },
    })
}

fn to_document(id: &str, mut fields: Fields) -> Result<Document> {
    fields.remove("id");
    let mut document = bson::to_document(&fields)?;
    document.insert("_id", id);
    Ok(document)
}

fn from_document(mut document: Document) -> Result<Fields> {
    let id = match document.remove("_id") {
        Some(Bson::String(id)) => id,
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let mut fields: Fields = bson::from_document(document)?;
    fields.insert("id".to_string(), Value::String(id));
    Ok(fields)
}

fn bson_as_i64(value: Option<&Bson>) -> i64 {
    match value {
        Some(Bson::Int64(n)) => *n,
        Some(Bson::Int32(n)) => i64::from(*n),
        Some(Bson::Double(n)) => *n as i64,
        _ => 0,
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Fields>> {
        self.collection(collection)
            .find_one(doc! { "_id": id })
            .await?
            .map(from_document)
            .transpose()
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Fields>> {
        let mut filter = filter_document(&query.filters)?;
        if let Some(cursor) = self.cursor_filter(collection, query).await? {
            filter = if filter.is_empty() {
                cursor
            } else {
                doc! { "$and": [filter, cursor] }
            };
        }

        let sort = match &query.order_by {
            Some(order) => {
                let direction: i32 = if order.descending { -1 } else { 1 };
                doc! { order.field.as_str(): direction, "_id": 1 }
            }
            None => doc! { "_id": 1 },
        };

        let coll = self.collection(collection);
        let mut find = coll.find(filter).sort(sort);
        if let Some(limit) = query.limit {
            find = find.limit(limit as i64);
        }

        let documents: Vec<Document> = find.await?.try_collect().await?;
        documents.into_iter().map(from_document).collect()
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let document = to_document(id, fields)?;
        self.collection(collection)
            .replace_one(doc! { "_id": id }, document)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<bool> {
        let mut changes = to_document(id, fields)?;
        changes.remove("_id");
        if changes.is_empty() {
            return Ok(self.get(collection, id).await?.is_some());
        }

        let result = self
            .collection(collection)
            .update_one(doc! { "_id": id }, doc! { "$set": changes })
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let result = self.collection(collection).delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn atomic_increment(&self, collection: &str, id: &str, field: &str, delta: i64) -> Result<i64> {
        let updated = self
            .collection(collection)
            .find_one_and_update(doc! { "_id": id }, doc! { "$inc": { field: delta } })
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| MadangError::NotFound(format!("{}/{} not found", collection, id)))?;

        Ok(bson_as_i64(updated.get(field)))
    }

    async fn count_where(&self, collection: &str, filters: &[Filter]) -> Result<u64> {
        let filter = filter_document(filters)?;
        Ok(self.collection(collection).count_documents(filter).await?)
    }

    async fn sum_where(&self, collection: &str, filters: &[Filter], field: &str) -> Result<i64> {
        let pipeline = vec![
            doc! { "$match": filter_document(filters)? },
            doc! { "$group": { "_id": Bson::Null, "total": { "$sum": format!("${}", field) } } },
        ];
        let totals: Vec<Document> = self
            .collection(collection)
            .aggregate(pipeline)
            .await?
            .try_collect()
            .await?;
        Ok(bson_as_i64(totals.first().and_then(|t| t.get("total"))))
    }
}
