//! Document store abstraction
//!
//! The core only needs point reads, filtered/ordered queries, whole-document
//! writes and a single-field atomic increment. Records are flat JSON objects
//! keyed by a string id; the id is echoed back in the `id` field.

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use crate::types::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;

/// A stored record
pub type Fields = serde_json::Map<String, Value>;

/// Comparison used by a [`Filter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gt,
    Gte,
    Lt,
}

/// Single-field predicate
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    pub fn gt(field: &str, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Gt, value)
    }

    pub fn gte(field: &str, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Gte, value)
    }

    pub fn lt(field: &str, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Lt, value)
    }

    fn new(field: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op,
            value: value.into(),
        }
    }

    /// Evaluate against a record. A missing field never matches, except
    /// `Eq` against JSON null.
    pub fn matches(&self, record: &Fields) -> bool {
        let actual = record.get(&self.field).unwrap_or(&Value::Null);
        match self.op {
            FilterOp::Eq => values_equal(actual, &self.value),
            FilterOp::Gt => compare_values(actual, &self.value) == Some(Ordering::Greater),
            FilterOp::Gte => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::Lt => compare_values(actual, &self.value) == Some(Ordering::Less),
        }
    }
}

/// Sort key for a query
#[derive(Debug, Clone)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

/// Filtered, ordered, bounded query.
///
/// Results are ordered by `order_by` with the record id as tiebreaker, so
/// `start_after` (a record id) gives stable cursor pagination. An unknown
/// cursor id is ignored.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub start_after: Option<String>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by_desc(mut self, field: &str) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            descending: true,
        });
        self
    }

    pub fn order_by_asc(mut self, field: &str) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            descending: false,
        });
        self
    }

    pub fn start_after(mut self, id: Option<&str>) -> Self {
        self.start_after = id.map(str::to_string);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Storage backend used by every core component
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name for logs and health output
    fn name(&self) -> &'static str;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Fields>>;

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Fields>>;

    /// Create or replace a record
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<()>;

    /// Merge fields into an existing record. Returns false if it does not exist.
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<bool>;

    /// Returns false if nothing was deleted
    async fn delete(&self, collection: &str, id: &str) -> Result<bool>;

    /// Add `delta` to an integer field and return the new value.
    ///
    /// A missing field counts as 0. A missing record is `NotFound`.
    async fn atomic_increment(&self, collection: &str, id: &str, field: &str, delta: i64) -> Result<i64>;

    async fn count_where(&self, collection: &str, filters: &[Filter]) -> Result<u64>;

    /// Sum of an integer field over matching records; missing fields count as 0
    async fn sum_where(&self, collection: &str, filters: &[Filter], field: &str) -> Result<i64>;
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Ordering between two JSON scalars of the same kind
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}
