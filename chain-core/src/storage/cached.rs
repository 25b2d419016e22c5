use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use super::KvBackend;
use crate::error::BlockchainError;

/// Layers an LRU read cache over any [`KvBackend`]. [`crate::storage::build_backend`]
/// wraps the durable [`super::SledBackend`] in one of these, sized from
/// `Nexus`'s `cache_size` configuration parameter, whenever that value is
/// zero or positive.
///
/// Reads populate the cache on a miss; both `put` and `delete` evict the
/// touched key rather than trying to keep the cache coherent with a
/// stale value, since correctness (always asking the backend on a write)
/// matters far more than avoiding one extra invalidation.
pub struct CachedBackend<B> {
    inner: B,
    cache: Mutex<LruCache<Vec<u8>, Option<Vec<u8>>>>,
}

impl<B: KvBackend> CachedBackend<B> {
    pub fn new(inner: B, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self { inner, cache: Mutex::new(LruCache::new(capacity)) }
    }
}

impl<B: KvBackend> KvBackend for CachedBackend<B> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, BlockchainError> {
        if let Some(hit) = self.cache.lock().get(key) {
            return Ok(hit.clone());
        }
        let value = self.inner.get(key)?;
        self.cache.lock().put(key.to_vec(), value.clone());
        Ok(value)
    }

    fn put(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), BlockchainError> {
        self.inner.put(key, value)?;
        self.cache.lock().pop(key);
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), BlockchainError> {
        self.inner.delete(key)?;
        self.cache.lock().pop(key);
        Ok(())
    }

    fn count(&self) -> Result<usize, BlockchainError> {
        self.inner.count()
    }

    fn keys(&self) -> Result<Vec<Vec<u8>>, BlockchainError> {
        self.inner.keys()
    }
}
