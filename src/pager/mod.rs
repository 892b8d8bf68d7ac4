//! Cursor pagination over a [`DocumentStore`] collection.
//!
//! Pages are fetched with a start-after cursor taken from the previous page
//! and kept in a per-pager cache keyed by (page, page size). When the previous
//! page is not cached the pager over-fetches from the start of the collection.
//!
//! Fetches on one pager run one at a time. `invalidate` and `reset` never
//! wait for them: they bump the generation, and a fetch that finishes under an
//! older generation is dropped with [`PagerError::Superseded`].

mod cache;
mod pagination;
mod registry;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;

use crate::store::{Cursor, Document, DocumentStore, Filter, OrderBy, Query, StoreError};

pub use cache::{CacheEntry, PageCache, PageKey};
pub use pagination::Pagination;
pub use registry::{PagerKey, PagerRegistry};

#[derive(Debug, thiserror::Error)]
pub enum PagerError {
    #[error("page number must be at least 1")]
    InvalidPage,
    #[error("page size must be at least 1")]
    InvalidPageSize,
    #[error("fetch failed: {0}")]
    FetchFailed(#[from] StoreError),
    #[error("result discarded, pager was invalidated while fetching")]
    Superseded,
}

/// Rows of one page. `has_more` is true whenever the page came back full, so a
/// collection that is an exact multiple of the page size reports one extra
/// (empty) page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub rows: Vec<Document>,
    pub has_more: bool,
    pub page: usize,
    pub page_size: usize,
}

impl Page {
    fn new(rows: Vec<Document>, key: PageKey) -> Self {
        Self {
            has_more: rows.len() == key.page_size,
            rows,
            page: key.page,
            page_size: key.page_size,
        }
    }
}

struct PagerState {
    cache: PageCache,
    generation: u64,
    filter: Filter,
    page_size: usize,
    page: usize,
    total: Option<u64>,
}

impl PagerState {
    fn invalidate(&mut self) {
        self.cache.clear();
        self.total = None;
        self.generation += 1;
    }
}

enum Plan {
    First,
    After(Cursor),
    OverFetch,
}

pub struct CursorPager {
    store: Arc<dyn DocumentStore>,
    collection: String,
    order_by: OrderBy,
    gate: AsyncMutex<()>,
    state: Mutex<PagerState>,
}

impl CursorPager {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        order_by: OrderBy,
        page_size: usize,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            order_by,
            gate: AsyncMutex::new(()),
            state: Mutex::new(PagerState {
                cache: PageCache::default(),
                generation: 0,
                filter: Filter::default(),
                page_size: page_size.max(1),
                page: 1,
                total: None,
            }),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn state(&self) -> MutexGuard<'_, PagerState> {
        // Every mutation leaves the state whole, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns page `page` of `page_size` rows matching `filter` (no filter
    /// means the whole collection). A different page size or filter than the
    /// cache was built with drops the cache first.
    pub async fn fetch_page(
        &self,
        page: usize,
        page_size: usize,
        filter: Option<&Filter>,
    ) -> Result<Page, PagerError> {
        if page < 1 {
            return Err(PagerError::InvalidPage);
        }
        if page_size < 1 {
            return Err(PagerError::InvalidPageSize);
        }
        let filter = filter.cloned().unwrap_or_default();
        let key = PageKey::new(page, page_size);

        let _gate = self.gate.lock().await;

        let (plan, generation) = {
            let mut state = self.state();
            if state.filter != filter {
                tracing::debug!("{}: filter changed, dropping page cache", self.collection);
                state.invalidate();
                state.filter = filter.clone();
            }
            if state.page_size != page_size {
                tracing::debug!(
                    "{}: page size {} -> {}, dropping page cache",
                    self.collection,
                    state.page_size,
                    page_size
                );
                state.invalidate();
                state.page_size = page_size;
            }

            if let Some(entry) = state.cache.get(&key) {
                tracing::debug!("{}: page {} served from cache", self.collection, page);
                let rows = entry.rows.clone();
                state.page = page;
                return Ok(Page::new(rows, key));
            }

            let plan = match key.previous() {
                None => Plan::First,
                Some(prev) => match state.cache.get(&prev).and_then(|e| e.last.clone()) {
                    Some(cursor) => Plan::After(cursor),
                    None => Plan::OverFetch,
                },
            };
            (plan, state.generation)
        };

        let base = Query::new(self.collection.clone(), self.order_by.clone()).filter(filter);
        let rows = match plan {
            Plan::First => {
                tracing::debug!("{}: fetching first page", self.collection);
                self.query(&base.limit(page_size)).await?
            }
            Plan::After(cursor) => {
                tracing::debug!("{}: fetching page {} after cursor", self.collection, page);
                self.query(&base.limit(page_size).start_after(cursor)).await?
            }
            Plan::OverFetch => {
                tracing::debug!(
                    "{}: no cursor for page {}, over-fetching from the start",
                    self.collection,
                    page - 1
                );
                let all = self
                    .query(&base.limit(page.saturating_mul(page_size)))
                    .await?;
                all.into_iter()
                    .skip((page - 1).saturating_mul(page_size))
                    .collect()
            }
        };

        let mut state = self.state();
        if state.generation != generation {
            tracing::warn!(
                "{}: discarding page {} fetched before invalidation",
                self.collection,
                page
            );
            return Err(PagerError::Superseded);
        }
        state
            .cache
            .insert(key, CacheEntry::new(rows.clone(), &self.order_by.field));
        state.page = page;
        Ok(Page::new(rows, key))
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, PagerError> {
        self.store.query(query).await.map_err(|e| {
            tracing::error!("{}: page query failed: {}", self.collection, e);
            PagerError::FetchFailed(e)
        })
    }

    /// Counts the rows matching `filter` and remembers it as the total. A
    /// filter other than the current one switches the pager to it first.
    pub async fn fetch_total_count(&self, filter: Option<&Filter>) -> Result<u64, PagerError> {
        let filter = filter.cloned().unwrap_or_default();
        let generation = {
            let mut state = self.state();
            if state.filter != filter {
                state.invalidate();
                state.filter = filter.clone();
            }
            state.generation
        };

        let total = self
            .store
            .count(&self.collection, &filter)
            .await
            .map_err(|e| {
                tracing::error!("{}: count failed: {}", self.collection, e);
                PagerError::FetchFailed(e)
            })?;

        let mut state = self.state();
        if state.generation == generation && state.filter == filter {
            state.total = Some(total);
        }
        Ok(total)
    }

    /// The remembered total, counting only when there is none for `filter`.
    pub async fn total_count(&self, filter: Option<&Filter>) -> Result<u64, PagerError> {
        let cached = {
            let state = self.state();
            let same_filter = match filter {
                Some(f) => state.filter == *f,
                None => state.filter.is_empty(),
            };
            state.total.filter(|_| same_filter)
        };
        match cached {
            Some(total) => Ok(total),
            None => self.fetch_total_count(filter).await,
        }
    }

    /// Drops every cached page and the remembered total.
    pub fn invalidate(&self) {
        self.state().invalidate();
        tracing::debug!("{}: page cache invalidated", self.collection);
    }

    /// Switches to `page_size` and goes back to page 1 in one step.
    pub fn reset(&self, page_size: usize) -> Result<(), PagerError> {
        if page_size < 1 {
            return Err(PagerError::InvalidPageSize);
        }
        let mut state = self.state();
        state.invalidate();
        state.page_size = page_size;
        state.page = 1;
        Ok(())
    }

    pub fn pagination(&self) -> Pagination {
        let state = self.state();
        Pagination {
            page: state.page,
            page_size: state.page_size,
            total: state.total,
        }
    }

    pub fn cached_pages(&self) -> usize {
        self.state().cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::{Map, Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn named(id: &str, name: &str) -> Document {
        let mut data = Map::new();
        data.insert("name".into(), json!(name));
        Document::new(id, data)
    }

    fn letters(n: usize) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for (i, c) in ('A'..='Z').take(n).enumerate() {
            store.put("brands", named(&format!("b{i}"), &c.to_string()));
        }
        store
    }

    fn pager(store: &Arc<MemoryStore>, page_size: usize) -> CursorPager {
        CursorPager::new(store.clone(), "brands", OrderBy::asc("name"), page_size)
    }

    fn names(page: &Page) -> Vec<String> {
        page.rows
            .iter()
            .map(|d| d.str_field("name").unwrap_or_default().to_string())
            .collect()
    }

    #[tokio::test]
    async fn walks_five_rows_in_pages_of_two() {
        let store = letters(5);
        let pager = pager(&store, 2);

        let p1 = pager.fetch_page(1, 2, None).await.unwrap();
        assert_eq!(names(&p1), vec!["A", "B"]);
        assert!(p1.has_more);

        let p2 = pager.fetch_page(2, 2, None).await.unwrap();
        assert_eq!(names(&p2), vec!["C", "D"]);
        assert!(p2.has_more);

        let p3 = pager.fetch_page(3, 2, None).await.unwrap();
        assert_eq!(names(&p3), vec!["E"]);
        assert!(!p3.has_more);
        assert_eq!(store.query_count(), 3);

        let again = pager.fetch_page(2, 2, None).await.unwrap();
        assert_eq!(again, p2);
        assert_eq!(store.query_count(), 3);
    }

    #[tokio::test]
    async fn repeated_fetches_hit_the_store_once() {
        let store = letters(7);
        let pager = pager(&store, 3);
        let first = pager.fetch_page(1, 3, None).await.unwrap();
        for _ in 0..5 {
            assert_eq!(pager.fetch_page(1, 3, None).await.unwrap(), first);
        }
        assert_eq!(store.query_count(), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch_of_every_page() {
        let store = letters(6);
        let pager = pager(&store, 2);
        for page in 1..=3 {
            pager.fetch_page(page, 2, None).await.unwrap();
        }
        assert_eq!(pager.cached_pages(), 3);

        pager.invalidate();
        assert_eq!(pager.cached_pages(), 0);

        let before = store.query_count();
        for page in 1..=3 {
            pager.fetch_page(page, 2, None).await.unwrap();
        }
        assert_eq!(store.query_count(), before + 3);
    }

    #[tokio::test]
    async fn jumping_ahead_matches_sequential_walk() {
        let store = letters(11);
        let sequential = pager(&store, 3);
        let mut walked = Vec::new();
        for page in 1..=4 {
            walked.push(sequential.fetch_page(page, 3, None).await.unwrap());
        }

        for page in 1..=4 {
            let direct = pager(&store, 3);
            let jumped = direct.fetch_page(page, 3, None).await.unwrap();
            assert_eq!(jumped.rows, walked[page - 1].rows, "page {page}");
        }
    }

    #[tokio::test]
    async fn short_gap_page_takes_only_its_own_rows() {
        let store = letters(5);
        let pager = pager(&store, 2);
        let page = pager.fetch_page(3, 2, None).await.unwrap();
        assert_eq!(names(&page), vec!["E"]);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn far_gap_page_on_small_collection_is_empty() {
        let store = letters(3);
        let pager = pager(&store, 4);
        let page = pager.fetch_page(usize::MAX / 2, 4, None).await.unwrap();
        assert!(page.rows.is_empty());
        assert!(!page.has_more);
        assert_eq!(store.query_count(), 1);
    }

    #[tokio::test]
    async fn exact_multiple_reports_one_extra_empty_page() {
        let store = letters(3);
        let pager = pager(&store, 3);

        let p1 = pager.fetch_page(1, 3, None).await.unwrap();
        assert_eq!(p1.rows.len(), 3);
        assert!(p1.has_more);

        let p2 = pager.fetch_page(2, 3, None).await.unwrap();
        assert!(p2.rows.is_empty());
        assert!(!p2.has_more);
    }

    #[tokio::test]
    async fn changing_page_size_drops_cache() {
        let store = letters(6);
        let pager = pager(&store, 2);
        pager.fetch_page(1, 2, None).await.unwrap();
        pager.fetch_page(1, 3, None).await.unwrap();
        assert_eq!(pager.cached_pages(), 1);
        pager.fetch_page(1, 2, None).await.unwrap();
        assert_eq!(store.query_count(), 3);
    }

    #[tokio::test]
    async fn filter_is_applied_and_change_drops_cache() {
        let store = Arc::new(MemoryStore::new());
        for (id, name, status) in [
            ("1", "A", "on"),
            ("2", "B", "off"),
            ("3", "C", "on"),
            ("4", "D", "on"),
        ] {
            let mut doc = named(id, name);
            doc.data.insert("status".into(), json!(status));
            store.put("brands", doc);
        }
        let pager = pager(&store, 2);
        let on = Filter::new().eq("status", "on");

        let p1 = pager.fetch_page(1, 2, Some(&on)).await.unwrap();
        assert_eq!(names(&p1), vec!["A", "C"]);
        let p2 = pager.fetch_page(2, 2, Some(&on)).await.unwrap();
        assert_eq!(names(&p2), vec!["D"]);

        let all = pager.fetch_page(1, 2, None).await.unwrap();
        assert_eq!(names(&all), vec!["A", "B"]);
        assert_eq!(pager.cached_pages(), 1);
    }

    #[tokio::test]
    async fn failed_fetch_is_not_cached() {
        let store = letters(4);
        let pager = pager(&store, 2);

        store.set_failing(true);
        let err = pager.fetch_page(1, 2, None).await.unwrap_err();
        assert!(matches!(err, PagerError::FetchFailed(_)));
        assert_eq!(pager.cached_pages(), 0);

        store.set_failing(false);
        let page = pager.fetch_page(1, 2, None).await.unwrap();
        assert_eq!(names(&page), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn rejects_zero_page_and_size() {
        let store = letters(1);
        let pager = pager(&store, 2);
        assert!(matches!(
            pager.fetch_page(0, 2, None).await,
            Err(PagerError::InvalidPage)
        ));
        assert!(matches!(
            pager.fetch_page(1, 0, None).await,
            Err(PagerError::InvalidPageSize)
        ));
        assert!(matches!(pager.reset(0), Err(PagerError::InvalidPageSize)));
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn total_is_counted_once_and_cleared_by_reset() {
        let store = letters(5);
        let pager = pager(&store, 2);
        assert_eq!(pager.total_count(None).await.unwrap(), 5);
        assert_eq!(pager.total_count(None).await.unwrap(), 5);
        assert_eq!(store.count_calls(), 1);
        assert_eq!(pager.pagination().total_pages(), Some(3));

        pager.fetch_page(2, 2, None).await.unwrap();
        assert_eq!(pager.pagination().page, 2);

        pager.reset(4).unwrap();
        let state = pager.pagination();
        assert_eq!((state.page, state.page_size, state.total), (1, 4, None));
        assert_eq!(pager.cached_pages(), 0);
    }

    #[tokio::test]
    async fn counting_under_new_filter_switches_pager() {
        let store = letters(4);
        let pager = pager(&store, 2);
        pager.fetch_page(1, 2, None).await.unwrap();

        let only_b = Filter::new().eq("name", "B");
        assert_eq!(pager.total_count(Some(&only_b)).await.unwrap(), 1);
        assert_eq!(pager.cached_pages(), 0);
        assert_eq!(pager.pagination().total, Some(1));

        let page = pager.fetch_page(1, 2, Some(&only_b)).await.unwrap();
        assert_eq!(names(&page), vec!["B"]);
        assert_eq!(pager.total_count(Some(&only_b)).await.unwrap(), 1);
        assert_eq!(store.count_calls(), 1);
    }

    struct HeldStore {
        inner: MemoryStore,
        entered: Notify,
        release: Notify,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl HeldStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                entered: Notify::new(),
                release: Notify::new(),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DocumentStore for HeldStore {
        async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.entered.notify_one();
            self.release.notified().await;
            let rows = self.inner.query(query).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            rows
        }

        async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
            self.inner.count(collection, filter).await
        }

        async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
            self.inner.get(collection, id).await
        }

        async fn insert(
            &self,
            collection: &str,
            data: Map<String, Value>,
        ) -> Result<Document, StoreError> {
            self.inner.insert(collection, data).await
        }

        async fn update(
            &self,
            collection: &str,
            id: &str,
            data: Map<String, Value>,
        ) -> Result<Option<Document>, StoreError> {
            self.inner.update(collection, id, data).await
        }

        async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
            self.inner.delete(collection, id).await
        }
    }

    #[tokio::test]
    async fn fetch_resolving_after_invalidate_is_discarded() {
        let store = Arc::new(HeldStore::new());
        store.inner.put("brands", named("1", "A"));
        let pager = Arc::new(CursorPager::new(
            store.clone(),
            "brands",
            OrderBy::asc("name"),
            2,
        ));

        let task = {
            let pager = pager.clone();
            tokio::spawn(async move { pager.fetch_page(1, 2, None).await })
        };
        store.entered.notified().await;
        pager.invalidate();
        store.release.notify_one();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(PagerError::Superseded)));
        assert_eq!(pager.cached_pages(), 0);
    }

    #[tokio::test]
    async fn overlapping_fetches_run_one_at_a_time() {
        let store = Arc::new(HeldStore::new());
        store.inner.put("brands", named("1", "A"));
        store.inner.put("brands", named("2", "B"));
        store.inner.put("brands", named("3", "C"));
        let pager = Arc::new(CursorPager::new(
            store.clone(),
            "brands",
            OrderBy::asc("name"),
            2,
        ));

        let first = {
            let pager = pager.clone();
            tokio::spawn(async move { pager.fetch_page(1, 2, None).await })
        };
        store.entered.notified().await;
        let second = {
            let pager = pager.clone();
            tokio::spawn(async move { pager.fetch_page(1, 2, None).await })
        };
        // let the second fetch reach the gate while the first is held
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.in_flight.load(Ordering::SeqCst), 1);
        store.release.notify_one();

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert_eq!(names(&first), vec!["A", "B"]);
        assert_eq!(second, first);
        assert_eq!(store.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(store.inner.query_count(), 1);
        assert_eq!(pager.cached_pages(), 1);
    }
}
