use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use crate::graph::Entity;

/// Thread-safe LRU cache for entity search results
///
/// The same unit names come back across reconciliation runs (and the same
/// university label across candidates), so hits are memoised per query text.
pub struct SearchCache {
    cache: Mutex<LruCache<String, Vec<Entity>>>,
}

impl SearchCache {
    /// Create a new search cache with the specified capacity
    ///
    /// A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);

        Self {
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Cached hits for a query text
    pub fn get(&self, query: &str) -> Option<Vec<Entity>> {
        self.cache.lock().unwrap().get(query).cloned()
    }

    /// Store hits for a query text
    pub fn put(&self, query: String, hits: Vec<Entity>) {
        self.cache.lock().unwrap().put(query, hits);
    }

    pub fn len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().unwrap().is_empty()
    }

    pub fn clear(&self) {
        self.cache.lock().unwrap().clear();
    }
}
