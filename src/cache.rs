//! Time-bounded memoization of query results.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::debug;
use lru::LruCache;

struct Entry<V> {
    value: V,
    inserted: Instant,
}

/// Size-bounded map whose entries expire a fixed time after insertion.
///
/// A `ttl` of `None` keeps entries until they are evicted. When the cache is
/// full the least recently used entry makes room for the new one.
pub struct TtlCache<K, V> {
    ttl: Option<Duration>,
    entries: Mutex<LruCache<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// A `max_entries` of zero is treated as one.
    pub fn new(ttl: Option<Duration>, max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            ttl,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<K, Entry<V>>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn is_fresh(&self, entry: &Entry<V>, now: Instant) -> bool {
        self.ttl.map_or(true, |ttl| now.duration_since(entry.inserted) < ttl)
    }

    /// Returns a fresh value and marks it most recently used. Stale entries are dropped.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if self.is_fresh(entry, now) => Some(entry.value.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        let now = Instant::now();
        let mut entries = self.lock();
        let stale: Vec<K> = entries
            .iter()
            .filter(|(_, entry)| !self.is_fresh(entry, now))
            .map(|(k, _)| k.clone())
            .collect();
        for k in &stale {
            entries.pop(k);
        }
        if let Some((evicted, _)) = entries.push(key.clone(), Entry { value, inserted: now }) {
            if evicted != key {
                debug!("Cache full, evicted least recently used entry");
            }
        }
    }

    /// Returns the cached value or computes it. Errors are passed through and never stored.
    ///
    /// The lock is not held while `compute` runs, so concurrent misses on the
    /// same key may both compute.
    pub fn get_or_try_insert_with<E, F>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(&key) {
            debug!("Cache hit");
            return Ok(value);
        }
        let value = compute()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
