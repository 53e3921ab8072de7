//! Process wiring: logging, cache store and database pool.
//!
//! Embedding applications (and the `admin` binary) call these once at startup
//! with a validated [`Config`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, mask_connection_string};
use crate::domain::entities::Entity;
use crate::infrastructure::cache::{CacheStore, MemoryCache, NullCache, RedisCache};
use crate::infrastructure::persistence::{MemoryStore, PersistenceEngine, PgStore};

/// Installs the global `tracing` subscriber.
///
/// Filtering follows `config.log_level` (`RUST_LOG` syntax); `LOG_FORMAT=json`
/// switches to one JSON object per event.
///
/// # Errors
///
/// Returns an error if the filter does not parse or a subscriber is already installed.
pub fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_level)
        .with_context(|| format!("Invalid log filter '{}'", config.log_level))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = if config.log_format == "json" {
        builder.json().flatten_event(true).try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))
}

/// Picks the cache store for this process.
///
/// Redis when configured and reachable, the null cache when Redis is configured
/// but unreachable, otherwise the in-process cache (or the null cache when its
/// capacity is 0).
pub async fn connect_cache(config: &Config) -> Arc<dyn CacheStore> {
    if let Some(redis_url) = &config.redis_url {
        return match RedisCache::connect(redis_url).await {
            Ok(redis) => {
                tracing::info!("Cache enabled (Redis)");
                Arc::new(redis)
            }
            Err(e) => {
                tracing::warn!("Failed to connect to Redis: {}. Using NullCache.", e);
                Arc::new(NullCache::new())
            }
        };
    }

    if config.memory_cache_capacity > 0 {
        tracing::info!(
            "Cache enabled (in-memory, {} entries)",
            config.memory_cache_capacity
        );
        Arc::new(MemoryCache::new(config.memory_cache_capacity))
    } else {
        tracing::info!("Cache disabled (NullCache)");
        Arc::new(NullCache::new())
    }
}

/// Opens a connection pool with the configured pool settings.
///
/// # Errors
///
/// Returns an error if the database cannot be reached.
pub async fn open_pool(database_url: &str, config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime))
        .connect(database_url)
        .await
        .with_context(|| {
            format!(
                "Failed to connect to {}",
                mask_connection_string(database_url)
            )
        })?;

    tracing::info!("Connected to database");
    Ok(pool)
}

/// Applies the embedded migrations.
///
/// # Errors
///
/// Returns an error if a migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to migrate")?;
    Ok(())
}

/// Opens the pool and applies migrations, or returns `None` when no database is configured.
///
/// # Errors
///
/// Returns an error if the database cannot be reached or a migration fails.
pub async fn connect_pool(config: &Config) -> Result<Option<Arc<PgPool>>> {
    let Some(database_url) = &config.database_url else {
        tracing::info!("No database configured, entities are kept in memory");
        return Ok(None);
    };

    let pool = open_pool(database_url, config).await?;
    run_migrations(&pool).await?;

    Ok(Some(Arc::new(pool)))
}

/// The persistence engine for `E`: PostgreSQL when a pool is given, memory otherwise.
pub fn engine_for<E: Entity>(pool: Option<&Arc<PgPool>>) -> Arc<dyn PersistenceEngine<E>> {
    match pool {
        Some(pool) => Arc::new(PgStore::<E>::new(pool.clone())),
        None => Arc::new(MemoryStore::<E>::new()),
    }
}
