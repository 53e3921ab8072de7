//! Caching layer behind the caching repository decorator.
//!
//! Provides a [`CacheStore`] trait with three implementations:
//! - [`RedisCache`] - Production Redis-backed cache
//! - [`MemoryCache`] - In-process LRU cache with TTL
//! - [`NullCache`] - No-op implementation for testing/disabled caching
//!
//! Key derivation lives in [`keys`].

pub mod keys;
mod memory_cache;
mod null_cache;
mod redis_cache;
mod service;

pub use keys::{CacheKeys, stable_hash};
pub use memory_cache::MemoryCache;
pub use null_cache::NullCache;
pub use redis_cache::RedisCache;
pub use service::{CacheError, CacheResult, CacheStore};

#[cfg(test)]
pub use service::MockCacheStore;
