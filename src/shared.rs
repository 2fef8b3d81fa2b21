//! Shared Cache Module
//!
//! Cloneable handle that serializes every operation on one cache instance.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::{CacheStore, CacheValue, EvictionMode};
use crate::config::CacheConfig;
use crate::error::Result;

// == Shared Cache ==
/// Thread-safe handle to a cache instance.
///
/// Each instance owns a single exclusion domain: every operation below runs
/// as one atomic critical section, so concurrent callers observe a total
/// order of mutations. Serialization and deserialization happen inside the
/// critical section because they determine the bytes charged. Clones of a
/// handle address the same underlying store.
pub struct SharedCache<V> {
    inner: Arc<Mutex<CacheStore<V>>>,
}

impl<V> Clone for SharedCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: CacheValue> SharedCache<V> {
    // == Constructors ==
    /// Creates a shared cache from the megabyte-denominated configuration.
    pub fn new(config: &CacheConfig) -> Result<Self> {
        Ok(Self::from_store(CacheStore::new(config)?))
    }

    /// Creates a shared cache with byte-denominated limits.
    pub fn with_limits(
        limit_bytes: usize,
        mode: EvictionMode,
        serialize_threshold_bytes: usize,
    ) -> Result<Self> {
        Ok(Self::from_store(CacheStore::with_limits(
            limit_bytes,
            mode,
            serialize_threshold_bytes,
        )?))
    }

    /// Wraps an existing store in a shared handle.
    pub fn from_store(store: CacheStore<V>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    // == Operations ==
    /// Inserts or replaces the entry under `id`, evicting until it fits.
    pub fn put(&self, id: &str, value: V) -> Result<()> {
        self.inner.lock().put(id, value)
    }

    /// Returns the value stored under `id`.
    pub fn get(&self, id: &str) -> Result<V> {
        self.inner.lock().get(id)
    }

    /// Replaces the value under an existing `id`.
    pub fn update(&self, id: &str, value: V) -> Result<()> {
        self.inner.lock().update(id, value)
    }

    /// Removes the entry under `id`.
    pub fn delete(&self, id: &str) -> Result<()> {
        self.inner.lock().delete(id)
    }

    /// Checks whether `id` is cached. Does not count as an access.
    pub fn contains(&self, id: &str) -> bool {
        self.inner.lock().contains(id)
    }

    /// Removes all entries; the monotonic counter is preserved.
    pub fn clear(&self) {
        self.inner.lock().clear()
    }

    /// Returns the value under `id` without touching policy metadata.
    pub fn peek(&self, id: &str) -> Option<V> {
        self.inner.lock().peek(id)
    }

    // == Snapshots ==
    /// Returns a snapshot mapping each identifier to its charged bytes.
    pub fn overview(&self) -> HashMap<String, usize> {
        self.inner.lock().overview()
    }

    /// Returns a snapshot of all identifiers in bookkeeping-stamp order.
    pub fn identifiers(&self) -> Vec<String> {
        self.inner.lock().identifiers()
    }

    // == Memory Accounting ==
    /// Returns the total charged bytes.
    pub fn memory_usage_bytes(&self) -> usize {
        self.inner.lock().memory_usage_bytes()
    }

    /// Returns the total charged bytes in megabytes.
    pub fn memory_usage_mb(&self) -> f64 {
        self.inner.lock().memory_usage_mb()
    }

    /// Returns the used fraction of the memory limit, in [0, 1].
    pub fn memory_usage_fraction(&self) -> f64 {
        self.inner.lock().memory_usage_fraction()
    }

    // == Accessors ==
    /// Returns the memory limit in bytes.
    pub fn memory_limit_bytes(&self) -> usize {
        self.inner.lock().memory_limit_bytes()
    }

    /// Returns the eviction mode.
    pub fn mode(&self) -> EvictionMode {
        self.inner.lock().mode()
    }

    /// Returns whether the entry under `id` is stored in serialized form.
    pub fn is_serialized(&self, id: &str) -> Option<bool> {
        self.inner.lock().is_serialized(id)
    }

    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
