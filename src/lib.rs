//! # repocache
//!
//! A generic repository for persisted entities, with a cache-aside decorator
//! backed by Redis or an in-process LRU cache.
//!
//! ## Architecture
//!
//! - **Domain Layer** ([`domain`]) - Entity contract, criteria, pagination and the [`domain::repositories::Repository`] trait
//! - **Application Layer** ([`application`]) - [`application::BaseRepository`] and [`application::CachingRepository`]
//! - **Infrastructure Layer** ([`infrastructure`]) - Persistence engines (PostgreSQL, memory) and cache stores (Redis, memory, null)
//!
//! ## Quick Start
//!
//! ```ignore
//! let config = repocache::config::load_from_env()?;
//! repocache::bootstrap::init_tracing(&config)?;
//!
//! let pool = repocache::bootstrap::connect_pool(&config).await?;
//! let cache = repocache::bootstrap::connect_cache(&config).await;
//!
//! let base = Arc::new(BaseRepository::new(bootstrap::engine_for::<Article>(pool.as_ref()))?);
//! let articles = CachingRepository::new(
//!     base,
//!     cache,
//!     "article",
//!     Duration::from_secs(config.cache_ttl_seconds),
//! );
//!
//! let article = articles.find_or_fail(1).await?;
//! ```
//!
//! ## Configuration
//!
//! Runtime configuration is loaded from environment variables via [`config::Config`].
//! See [`config`] module for available options.

pub mod application;
pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod utils;

pub use error::{RepositoryError, RepositoryResult};

/// Commonly used types for external consumers.
///
/// Re-exports frequently used types to simplify imports for library users
/// and integration tests.
pub mod prelude {
    pub use crate::application::{BaseRepository, CachingRepository};
    pub use crate::domain::entities::{Criteria, Entity, EntityId, FieldValue};
    pub use crate::domain::pagination::{
        Cursor, CursorRequest, CursorResult, Page, PagingInfo, SortDirection, SortSpec,
    };
    pub use crate::domain::repositories::{CountWhere, ReadContext, ReadOperation, Repository};
    pub use crate::domain::validation::{ValidationRuleProvider, ValidationRules};
    pub use crate::error::{RepositoryError, RepositoryResult, WriteAction};
    pub use crate::infrastructure::cache::{CacheStore, MemoryCache, NullCache, RedisCache};
    pub use crate::infrastructure::persistence::{MemoryStore, PersistenceEngine, PgStore};
}
