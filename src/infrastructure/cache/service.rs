//! Cache store trait and error types.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Errors that can occur during cache operations.
#[derive(Debug)]
pub enum CacheError {
    ConnectionError(String),
    OperationError(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ConnectionError(e) => write!(f, "Cache connection error: {}", e),
            Self::OperationError(e) => write!(f, "Cache operation error: {}", e),
        }
    }
}

impl std::error::Error for CacheError {}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Key/value store with per-entry TTL used by the caching decorator.
///
/// Values are opaque strings (the decorator stores JSON). Each individual
/// operation must be atomic for its key; nothing else is assumed, in particular
/// there is no check-and-set.
///
/// Unlike a fail-open cache, errors are returned to the caller and propagate
/// out of the repository.
///
/// # Implementations
///
/// - [`crate::infrastructure::cache::RedisCache`] - Redis-backed cache with TTL support
/// - [`crate::infrastructure::cache::MemoryCache`] - In-process LRU cache with TTL
/// - [`crate::infrastructure::cache::NullCache`] - No-op implementation for disabled caching
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns whether a live entry exists for `key`.
    async fn has(&self, key: &str) -> CacheResult<bool>;

    /// Retrieves the value stored under `key`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(value))` on hit
    /// - `Ok(None)` on miss or expired entry
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// # Arguments
    ///
    /// - `key` - Fully namespaced cache key
    /// - `value` - Serialized payload
    /// - `ttl` - Lifetime of the entry
    async fn put(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()>;

    /// Removes the entry for `key`. Returns whether an entry was removed.
    async fn forget(&self, key: &str) -> CacheResult<bool>;

    /// Checks if the cache backend is healthy.
    async fn health_check(&self) -> bool;
}
