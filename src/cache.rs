//! Read-through cache of analysis results.
//!
//! Keys pair an input fingerprint with a config fingerprint. Values are shared
//! behind `Arc`, so readers see either no entry or a complete one. Concurrent
//! misses on the same key may both compute; the last insert wins.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cache key: `(input fingerprint, config fingerprint)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Fingerprint of the responses.
    pub input: String,
    /// Fingerprint of the configuration.
    pub config: String,
}

impl CacheKey {
    /// Create a key.
    pub fn new(input: impl Into<String>, config: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            config: config.into(),
        }
    }
}

/// Concurrent result cache.
#[derive(Debug)]
pub struct ResultCache<V> {
    entries: DashMap<CacheKey, Arc<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V> Default for ResultCache<V> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }
}

impl<V> ResultCache<V> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `key`, counting a hit or miss.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<V>> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(entry.value()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn insert(&self, key: CacheKey, value: Arc<V>) {
        self.entries.insert(key, value);
    }

    /// Return the cached value or compute, store and return a new one.
    ///
    /// `compute` runs without holding any shard lock. Errors are returned
    /// as is and nothing is cached.
    pub fn get_or_try_insert_with<E, F>(&self, key: CacheKey, compute: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }
        let value = Arc::new(compute()?);
        self.insert(key, Arc::clone(&value));
        Ok(value)
    }

    /// Drop the entry for `key`.
    pub fn remove(&self, key: &CacheKey) -> Option<Arc<V>> {
        self.entries.remove(key).map(|(_, v)| v)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry. Counters are kept.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Lookups that found an entry.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that found nothing.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}
