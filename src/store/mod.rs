//! Document store contract used by the pager and the admin endpoints.
//!
//! A store holds schema-less documents grouped into collections. Lists are
//! read through [`Query`]: equality filter, ordering on one field, a limit and
//! an optional start-after [`Cursor`].

mod memory;
mod postgres;

use std::cmp::Ordering;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;

/// Field name under which the document identifier is exposed.
pub const ID_FIELD: &str = "id";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

/// A row as returned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Value of `field`, with the id field resolving to the identifier.
    pub fn field(&self, field: &str) -> Value {
        if field == ID_FIELD {
            return Value::String(self.id.clone());
        }
        self.data.get(field).cloned().unwrap_or(Value::Null)
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }

    /// Position of this document in an ordering on `field`.
    pub fn cursor(&self, field: &str) -> Cursor {
        Cursor {
            key: self.field(field),
            id: self.id.clone(),
        }
    }

    /// Flattened JSON object with the id merged in.
    pub fn to_json(&self) -> Value {
        let mut obj = self.data.clone();
        obj.insert(ID_FIELD.to_string(), Value::String(self.id.clone()));
        Value::Object(obj)
    }
}

/// Opaque resume point: the ordering key of a row plus its id as tie-break.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    key: Value,
    id: String,
}

impl Cursor {
    pub fn key(&self) -> &Value {
        &self.key
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }

    /// Compares two documents on the ordering field, falling back to the id.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let ord = compare_values(&a.field(&self.field), &b.field(&self.field))
            .then_with(|| a.id.cmp(&b.id));
        match self.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        }
    }

    /// True when `doc` sorts strictly after `cursor` in this ordering.
    pub fn is_after(&self, doc: &Document, cursor: &Cursor) -> bool {
        let ord = compare_values(&doc.field(&self.field), &cursor.key)
            .then_with(|| doc.id.as_str().cmp(cursor.id.as_str()));
        match self.direction {
            Direction::Asc => ord == Ordering::Greater,
            Direction::Desc => ord == Ordering::Less,
        }
    }
}

/// Conjunction of field equalities. Empty matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Map<String, Value>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &Map<String, Value> {
        &self.conditions
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(field, expected)| doc.field(field) == *expected)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filter: Filter,
    pub order_by: OrderBy,
    pub limit: usize,
    pub start_after: Option<Cursor>,
}

impl Query {
    pub fn new(collection: impl Into<String>, order_by: OrderBy) -> Self {
        Self {
            collection: collection.into(),
            filter: Filter::default(),
            order_by,
            limit: usize::MAX,
            start_after: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn start_after(mut self, cursor: Cursor) -> Self {
        self.start_after = Some(cursor);
        self
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Ordered, filtered, limited read.
    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    async fn insert(
        &self,
        collection: &str,
        data: Map<String, Value>,
    ) -> Result<Document, StoreError>;

    /// Shallow-merges `data` into the document. Returns `None` when missing.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        data: Map<String, Value>,
    ) -> Result<Option<Document>, StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;
}

fn type_rank(value: &Value) -> u8 {
    // jsonb btree order
    match value {
        Value::Null => 0,
        Value::String(_) => 1,
        Value::Number(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values, by type first and then by value.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.total_cmp(&y)
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(a, b)| compare_values(a, b))
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(_), Value::Object(_)) => a.to_string().cmp(&b.to_string()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
