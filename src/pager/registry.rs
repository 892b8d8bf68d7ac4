use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::store::{DocumentStore, OrderBy};

use super::CursorPager;

/// One pager per viewer, collection and ordering, the way each open list
/// screen owns its own cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PagerKey {
    pub owner: String,
    pub collection: String,
    pub order_by: OrderBy,
}

struct Slot {
    pager: Arc<CursorPager>,
    last_used: Instant,
}

/// Pagers unused for longer than `idle_ttl` are dropped on the next lookup.
pub struct PagerRegistry {
    store: Arc<dyn DocumentStore>,
    default_page_size: usize,
    idle_ttl: Duration,
    pagers: Mutex<HashMap<PagerKey, Slot>>,
}

impl PagerRegistry {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        default_page_size: usize,
        idle_ttl: Duration,
    ) -> Self {
        Self {
            store,
            default_page_size,
            idle_ttl,
            pagers: Mutex::new(HashMap::new()),
        }
    }

    fn pagers(&self) -> MutexGuard<'_, HashMap<PagerKey, Slot>> {
        self.pagers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn pager_for(&self, key: PagerKey) -> Arc<CursorPager> {
        self.pager_for_at(key, Instant::now())
    }

    pub(crate) fn pager_for_at(&self, key: PagerKey, now: Instant) -> Arc<CursorPager> {
        let mut pagers = self.pagers();

        let before = pagers.len();
        pagers.retain(|_, slot| now.saturating_duration_since(slot.last_used) <= self.idle_ttl);
        if pagers.len() < before {
            tracing::debug!("evicted {} idle pager(s)", before - pagers.len());
        }

        let slot = pagers.entry(key).or_insert_with_key(|key| {
            tracing::debug!(
                "new pager for {} on {} by {:?}",
                key.owner,
                key.collection,
                key.order_by
            );
            Slot {
                pager: Arc::new(CursorPager::new(
                    self.store.clone(),
                    key.collection.clone(),
                    key.order_by.clone(),
                    self.default_page_size,
                )),
                last_used: now,
            }
        });
        slot.last_used = now;
        slot.pager.clone()
    }

    /// Invalidates every pager over `collection`, after a write to it.
    pub fn invalidate_collection(&self, collection: &str) {
        let pagers = self.pagers();
        let mut invalidated = 0;
        for slot in pagers.values().filter(|s| s.pager.collection() == collection) {
            slot.pager.invalidate();
            invalidated += 1;
        }
        tracing::debug!("invalidated {} pager(s) on {}", invalidated, collection);
    }

    /// Forgets every pager held for `owner`.
    pub fn drop_owner(&self, owner: &str) {
        self.pagers().retain(|key, _| key.owner != owner);
    }

    pub fn len(&self) -> usize {
        self.pagers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pagers().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Document, MemoryStore};
    use serde_json::{Map, json};

    const HOUR: Duration = Duration::from_secs(3600);

    fn key(owner: &str, collection: &str) -> PagerKey {
        PagerKey {
            owner: owner.into(),
            collection: collection.into(),
            order_by: OrderBy::asc("name"),
        }
    }

    #[test]
    fn same_key_shares_a_pager() {
        let registry = PagerRegistry::new(Arc::new(MemoryStore::new()), 10, HOUR);
        let a = registry.pager_for(key("ops@shop.test", "brands"));
        let b = registry.pager_for(key("ops@shop.test", "brands"));
        let c = registry.pager_for(key("other@shop.test", "brands"));
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(a.pagination().page_size, 10);

        registry.drop_owner("ops@shop.test");
        let d = registry.pager_for(key("ops@shop.test", "brands"));
        assert!(!Arc::ptr_eq(&a, &d));
    }

    #[tokio::test]
    async fn write_invalidates_only_that_collection() {
        let store = Arc::new(MemoryStore::new());
        let mut data = Map::new();
        data.insert("name".into(), json!("Acme"));
        store.put("brands", Document::new("1", data.clone()));
        store.put("categories", Document::new("1", data));

        let registry = PagerRegistry::new(store, 10, HOUR);
        let brands = registry.pager_for(key("a", "brands"));
        let categories = registry.pager_for(key("a", "categories"));
        brands.fetch_page(1, 10, None).await.unwrap();
        categories.fetch_page(1, 10, None).await.unwrap();

        registry.invalidate_collection("brands");
        assert_eq!(brands.cached_pages(), 0);
        assert_eq!(categories.cached_pages(), 1);
    }

    #[test]
    fn idle_pagers_are_evicted_on_lookup() {
        let registry = PagerRegistry::new(Arc::new(MemoryStore::new()), 10, HOUR);
        let start = Instant::now();

        let stale = registry.pager_for_at(key("gone@shop.test", "brands"), start);
        registry.pager_for_at(key("ops@shop.test", "brands"), start);
        let later = start + Duration::from_secs(1800);
        let kept = registry.pager_for_at(key("ops@shop.test", "brands"), later);
        assert_eq!(registry.len(), 2);

        let after_ttl = start + HOUR + Duration::from_secs(1);
        let again = registry.pager_for_at(key("ops@shop.test", "brands"), after_ttl);
        assert!(Arc::ptr_eq(&kept, &again));
        assert_eq!(registry.len(), 1);

        let fresh = registry.pager_for_at(key("gone@shop.test", "brands"), after_ttl);
        assert!(!Arc::ptr_eq(&stale, &fresh));
        assert_eq!(registry.len(), 2);
    }
}
