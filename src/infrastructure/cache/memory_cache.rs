//! In-process cache with TTL and LRU eviction.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;
use tracing::debug;

use super::service::{CacheResult, CacheStore};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(value: String, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Thread-safe in-memory cache for single-process deployments and tests.
///
/// Entries expire lazily: an expired entry is dropped the next time its key is
/// touched. Once `capacity` entries are held, the least recently used one is
/// evicted.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    store: Arc<RwLock<LruCache<String, CacheEntry>>>,
}

impl MemoryCache {
    /// Creates a cache holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            store: Arc::new(RwLock::new(LruCache::new(capacity))),
        }
    }

    /// Number of entries currently held, expired ones included.
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn has(&self, key: &str) -> CacheResult<bool> {
        let store = self.store.read().await;
        Ok(store.peek(key).is_some_and(|entry| !entry.is_expired()))
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut store = self.store.write().await;

        let value = match store.peek(key).map(CacheEntry::is_expired) {
            Some(true) => {
                store.pop(key);
                None
            }
            Some(false) => store.get(key).map(|entry| entry.value.clone()),
            None => None,
        };

        match value {
            Some(_) => debug!("Cache HIT: {}", key),
            None => debug!("Cache MISS: {}", key),
        }

        Ok(value)
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        let mut store = self.store.write().await;
        store.put(key.to_string(), CacheEntry::new(value, ttl));
        debug!("Cache SET: {} (TTL: {}s)", key, ttl.as_secs());
        Ok(())
    }

    async fn forget(&self, key: &str) -> CacheResult<bool> {
        let mut store = self.store.write().await;
        let removed = store.pop(key).is_some();
        if removed {
            debug!("Cache INVALIDATE: {}", key);
        }
        Ok(removed)
    }

    async fn health_check(&self) -> bool {
        true
    }
}
