//! Bounded memoization for expensive, argument-deterministic calls.
//!
//! [`BoundedCache`] is an explicit LRU map: once the entry count reaches the
//! capacity, inserting a new key evicts the least-recently-used one. A `get`
//! counts as a use. Entries live only for the process lifetime — remote
//! content may change, so nothing here is persisted.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

use crate::config::CacheConfig;
use crate::models::WebResult;

/// A bounded map with least-recently-used eviction.
pub struct BoundedCache<K, V> {
    capacity: usize,
    entries: HashMap<K, (u64, V)>,
    tick: u64,
}

impl<K: Eq + Hash + Clone, V: Clone> BoundedCache<K, V> {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            tick: 0,
        }
    }

    /// Look up `key`, refreshing its recency on a hit.
    pub fn get(&mut self, key: &K) -> Option<V> {
        self.tick += 1;
        let tick = self.tick;
        self.entries.get_mut(key).map(|slot| {
            slot.0 = tick;
            slot.1.clone()
        })
    }

    /// Insert `key` → `value`, evicting the least-recently-used entry if the
    /// cache is full and `key` is new.
    pub fn insert(&mut self, key: K, value: V) {
        self.tick += 1;
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            // Capacities are small (≤256); a scan for the oldest tick is enough.
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, (tick, _))| *tick)
                .map(|(k, _)| k.clone());
            if let Some(k) = oldest {
                self.entries.remove(&k);
            }
        }
        self.entries.insert(key, (self.tick, value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Cache key for a package grep: `(package, pattern, max_results)`.
pub type GrepKey = (String, String, usize);

/// Cache key for a web search: `(query, num_results, category, days_back)`.
pub type WebKey = (String, usize, Option<String>, Option<u32>);

/// The three tool caches, each keyed by its call's full argument tuple.
pub struct ToolCaches {
    grep: Mutex<BoundedCache<GrepKey, String>>,
    web: Mutex<BoundedCache<WebKey, Vec<WebResult>>>,
    read: Mutex<BoundedCache<String, String>>,
}

impl ToolCaches {
    pub fn new(cfg: &CacheConfig) -> Self {
        Self {
            grep: Mutex::new(BoundedCache::new(cfg.grep_entries)),
            web: Mutex::new(BoundedCache::new(cfg.web_entries)),
            read: Mutex::new(BoundedCache::new(cfg.read_entries)),
        }
    }

    pub fn grep_get(&self, key: &GrepKey) -> Option<String> {
        lock(&self.grep).get(key)
    }

    pub fn grep_put(&self, key: GrepKey, value: String) {
        lock(&self.grep).insert(key, value);
    }

    pub fn web_get(&self, key: &WebKey) -> Option<Vec<WebResult>> {
        lock(&self.web).get(key)
    }

    pub fn web_put(&self, key: WebKey, value: Vec<WebResult>) {
        lock(&self.web).insert(key, value);
    }

    pub fn read_get(&self, key: &str) -> Option<String> {
        lock(&self.read).get(&key.to_string())
    }

    pub fn read_put(&self, key: String, value: String) {
        lock(&self.read).insert(key, value);
    }

    /// Current entry counts `(grep, web, read)` for status reporting.
    pub fn occupancy(&self) -> (usize, usize, usize) {
        (
            lock(&self.grep).len(),
            lock(&self.web).len(),
            lock(&self.read).len(),
        )
    }
}

/// Lock a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = BoundedCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), Some(2));
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut cache = BoundedCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        // Touch "a" so "b" becomes the eviction candidate.
        assert_eq!(cache.get(&"a"), Some(1));
        cache.insert("c", 3);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"b"), None);
    }

    #[test]
    fn test_reinserting_existing_key_does_not_evict() {
        let mut cache = BoundedCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("a", 10);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a"), Some(10));
        assert_eq!(cache.get(&"b"), Some(2));
    }

    #[test]
    fn test_zero_capacity_clamped_to_one() {
        let mut cache = BoundedCache::new(0);
        cache.insert("a", 1);
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.get(&"a"), Some(1));
    }

    #[test]
    fn test_tool_caches_keyed_by_full_argument_tuple() {
        let caches = ToolCaches::new(&CacheConfig::default());
        let k1: WebKey = ("tokio select".to_string(), 5, None, None);
        let k2: WebKey = ("tokio select".to_string(), 10, None, None);
        caches.web_put(
            k1.clone(),
            vec![WebResult {
                url: "https://tokio.rs".to_string(),
                title: "Tokio".to_string(),
                excerpts: vec![],
            }],
        );
        assert!(caches.web_get(&k1).is_some());
        // Same query, different num_results: distinct entry.
        assert!(caches.web_get(&k2).is_none());
        assert_eq!(caches.occupancy(), (0, 1, 0));
    }
}
