use std::collections::HashMap;

use crate::store::{Cursor, Document};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub page: usize,
    pub page_size: usize,
}

impl PageKey {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self { page, page_size }
    }

    /// Key of the page right before this one, if any.
    pub fn previous(&self) -> Option<Self> {
        (self.page > 1).then(|| Self::new(self.page - 1, self.page_size))
    }
}

/// One fetched page and the cursors at both of its ends.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub rows: Vec<Document>,
    pub first: Option<Cursor>,
    pub last: Option<Cursor>,
}

impl CacheEntry {
    pub fn new(rows: Vec<Document>, order_field: &str) -> Self {
        let first = rows.first().map(|d| d.cursor(order_field));
        let last = rows.last().map(|d| d.cursor(order_field));
        Self { rows, first, last }
    }
}

#[derive(Debug, Default)]
pub struct PageCache {
    entries: HashMap<PageKey, CacheEntry>,
}

impl PageCache {
    pub fn get(&self, key: &PageKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: PageKey, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    #[test]
    fn entry_records_both_ends() {
        let mut a = Map::new();
        a.insert("name".into(), json!("A"));
        let mut b = Map::new();
        b.insert("name".into(), json!("B"));
        let entry = CacheEntry::new(vec![Document::new("1", a), Document::new("2", b)], "name");
        assert_eq!(entry.first.as_ref().unwrap().id(), "1");
        assert_eq!(entry.last.as_ref().unwrap().key(), &json!("B"));

        let empty = CacheEntry::new(Vec::new(), "name");
        assert!(empty.first.is_none() && empty.last.is_none());
    }

    #[test]
    fn first_page_has_no_previous() {
        assert_eq!(PageKey::new(1, 10).previous(), None);
        assert_eq!(PageKey::new(3, 10).previous(), Some(PageKey::new(2, 10)));
    }
}
