use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{DocumentStore, Document, Filter, ID_FIELD, Query, StoreError};

/// In-process store. Counts list/count round trips and can be told to fail,
/// which is what the pager tests lean on.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    queries: AtomicUsize,
    counts: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a document with a caller-chosen id, replacing any previous one.
    pub fn put(&self, collection: &str, doc: Document) {
        if let Ok(mut collections) = self.collections.write() {
            let docs = collections.entry(collection.to_string()).or_default();
            docs.retain(|d| d.id != doc.id);
            docs.push(doc);
        }
    }

    /// Number of `query` calls that reached the store.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Number of `count` calls that reached the store.
    pub fn count_calls(&self) -> usize {
        self.counts.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store set to fail".into()));
        }
        Ok(())
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Vec<Document>>>, StoreError> {
        self.collections
            .read()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Vec<Document>>>, StoreError> {
        self.collections
            .write()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let collections = self.read()?;
        let Some(docs) = collections.get(&query.collection) else {
            return Ok(Vec::new());
        };

        let mut rows: Vec<Document> = docs
            .iter()
            .filter(|d| query.filter.matches(d))
            .filter(|d| match &query.start_after {
                Some(cursor) => query.order_by.is_after(d, cursor),
                None => true,
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| query.order_by.compare(a, b));
        rows.truncate(query.limit);
        Ok(rows)
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.counts.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let collections = self.read()?;
        let count = collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.check_available()?;
        let collections = self.read()?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned())
    }

    async fn insert(
        &self,
        collection: &str,
        mut data: Map<String, Value>,
    ) -> Result<Document, StoreError> {
        self.check_available()?;
        let id = match data.remove(ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => id,
            Some(other) if !other.is_null() => {
                return Err(StoreError::InvalidDocument(format!(
                    "id must be a string, got {other}"
                )));
            }
            _ => Uuid::new_v4().to_string(),
        };

        let doc = Document::new(id, data);
        let mut collections = self.write()?;
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.iter().any(|d| d.id == doc.id) {
            return Err(StoreError::InvalidDocument(format!(
                "duplicate id {}",
                doc.id
            )));
        }
        docs.push(doc.clone());
        Ok(doc)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        mut data: Map<String, Value>,
    ) -> Result<Option<Document>, StoreError> {
        self.check_available()?;
        data.remove(ID_FIELD);
        let mut collections = self.write()?;
        let Some(doc) = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
        else {
            return Ok(None);
        };
        doc.data.extend(data);
        Ok(Some(doc.clone()))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut collections = self.write()?;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|d| d.id != id);
        Ok(docs.len() != before)
    }
}
