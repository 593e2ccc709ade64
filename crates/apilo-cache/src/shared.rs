//! Concurrent handle over the response cache.

use crate::entry::CacheEntry;
use crate::error::CacheError;
use crate::stats::CacheStats;
use crate::store::ResponseCache;
use parking_lot::Mutex;
use std::sync::Arc;

/// A cloneable, thread-safe cache handle.
///
/// One exclusive lock covers both the entry map and the byte accumulator, so
/// every operation observes a consistent pairing of the two.
#[derive(Clone)]
pub struct SharedCache {
    inner: Arc<Mutex<ResponseCache>>,
}

impl SharedCache {
    pub(crate) fn new(store: ResponseCache) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// See [`ResponseCache::get`].
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.inner.lock().get(key)
    }

    /// See [`ResponseCache::set`].
    pub fn set(&self, key: String, entry: CacheEntry) -> Result<bool, CacheError> {
        self.inner.lock().set(key, entry)
    }

    /// See [`ResponseCache::clear`].
    pub fn clear(&self) {
        self.inner.lock().clear()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn used_bytes(&self) -> u64 {
        self.inner.lock().used_bytes()
    }

    /// See [`ResponseCache::stats`].
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats()
    }
}
