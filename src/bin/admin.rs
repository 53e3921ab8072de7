//! CLI administration tool for repocache deployments.
//!
//! Derives cache keys, inspects and purges cache entries, and checks or
//! migrates the database without writing any code.
//!
//! # Usage
//!
//! ```bash
//! # Key of an entity lookup
//! cargo run --bin admin -- key id article 42
//!
//! # Key of a read operation; the arguments are a JSON array, in call order
//! cargo run --bin admin -- key op article get_where '[[["status","published"]]]'
//!
//! # Inspect and purge cached entries
//! cargo run --bin admin -- cache show article:42
//! cargo run --bin admin -- cache forget article:all article:42
//!
//! # Check database connection
//! cargo run --bin admin -- db check
//! ```
//!
//! # Environment Variables
//!
//! - `REDIS_URL` / `REDIS_HOST`: required by `cache` commands
//! - `DATABASE_URL` / `DB_NAME`: required by `db` commands
//!
//! `key` commands need no connection at all.

use repocache::config::{Config, load_from_env, mask_connection_string};
use repocache::infrastructure::cache::{CacheKeys, CacheStore, RedisCache};
use repocache::{bootstrap, domain::entities::EntityId};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;
use serde_json::Value;

/// CLI tool for managing repocache deployments.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Derive cache keys
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Inspect or purge cache entries
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

/// Cache key subcommands.
#[derive(Subcommand)]
enum KeyAction {
    /// Key of an entity lookup by id
    Id { prefix: String, id: EntityId },

    /// Key of the unfiltered listing
    All { prefix: String },

    /// Key of a read operation
    Op {
        prefix: String,
        operation: String,
        /// Arguments as a JSON array, in call order
        #[arg(default_value = "[]")]
        args: String,
    },
}

/// Cache store subcommands.
#[derive(Subcommand)]
enum CacheAction {
    /// Check the cache connection
    Check,

    /// Print a cached payload
    Show { key: String },

    /// Remove cached entries
    Forget {
        #[arg(required = true)]
        keys: Vec<String>,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

/// Database operation subcommands.
#[derive(Subcommand)]
enum DbAction {
    /// Check database connection
    Check,

    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Key { action } => handle_key_action(action)?,
        Commands::Cache { action } => handle_cache_action(action, &load_from_env()?).await?,
        Commands::Db { action } => handle_db_action(action, &load_from_env()?).await?,
    }

    Ok(())
}

/// Prints the key a caching repository would use.
fn handle_key_action(action: KeyAction) -> Result<()> {
    let key = match action {
        KeyAction::Id { prefix, id } => CacheKeys::new(prefix).entity(id),
        KeyAction::All { prefix } => CacheKeys::new(prefix).all(),
        KeyAction::Op {
            prefix,
            operation,
            args,
        } => operation_key(&prefix, &operation, &args)?,
    };

    println!("{}", key);
    Ok(())
}

/// Key of `operation` called with the JSON array `args`.
///
/// A JSON array hashes like the argument tuple of the same length, so this also
/// covers built-in reads such as `get_where` and `get_page`.
fn operation_key(prefix: &str, operation: &str, args: &str) -> Result<String> {
    let args = match serde_json::from_str(args).context("Arguments must be valid JSON")? {
        Value::Array(args) => args,
        other => anyhow::bail!("Arguments must be a JSON array, got {}", other),
    };

    CacheKeys::new(prefix)
        .operation(operation, args.as_slice())
        .context("Failed to hash arguments")
}

async fn connect_redis(config: &Config) -> Result<RedisCache> {
    let redis_url = config
        .redis_url
        .as_deref()
        .context("REDIS_URL must be set; the in-process cache is private to its process")?;

    RedisCache::connect(redis_url)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))
}

/// Dispatches cache commands against the configured Redis store.
async fn handle_cache_action(action: CacheAction, config: &Config) -> Result<()> {
    let cache = connect_redis(config).await?;

    match action {
        CacheAction::Check => {
            println!("{}", "🔍 Checking cache connection...".bright_blue());

            if !cache.health_check().await {
                anyhow::bail!("Cache health check failed");
            }

            println!("{}", "✅ Cache connection OK".green().bold());
        }
        CacheAction::Show { key } => {
            let payload = cache
                .get(&key)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", key, e))?;

            match payload {
                Some(payload) => {
                    let pretty = serde_json::from_str::<Value>(&payload)
                        .and_then(|value| serde_json::to_string_pretty(&value))
                        .unwrap_or(payload);
                    println!("{}", pretty);
                }
                None => println!("{} {}", "Not cached:".yellow(), key.cyan()),
            }
        }
        CacheAction::Forget { keys, yes } => forget_keys(&cache, keys, yes).await?,
    }

    Ok(())
}

/// Purges cache entries after a confirmation prompt.
///
/// This is the manual remedy for filtered listings and pages left stale by a
/// write, which caching repositories do not invalidate themselves.
async fn forget_keys(cache: &RedisCache, keys: Vec<String>, skip_confirm: bool) -> Result<()> {
    println!("{}", "🗑️  Forget cache entries".bright_blue().bold());
    println!();
    for key in &keys {
        println!("  {}", key.cyan());
    }
    println!();

    if !skip_confirm {
        let confirmed = Confirm::new()
            .with_prompt(format!("Remove {} entries?", keys.len()))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("{}", "❌ Cancelled".red());
            return Ok(());
        }
    }

    let mut removed = 0;
    for key in &keys {
        let existed = cache
            .forget(key)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to forget {}: {}", key, e))?;
        if existed {
            removed += 1;
        } else {
            println!("  {} {}", "not cached:".bright_black(), key);
        }
    }

    println!();
    println!(
        "{} {}",
        "✅ Removed entries:".green().bold(),
        removed.to_string().bright_white().bold()
    );

    Ok(())
}

/// Handles database diagnostic commands.
async fn handle_db_action(action: DbAction, config: &Config) -> Result<()> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL (or DB_NAME) must be set")?;

    println!(
        "{} {}",
        "Database:".bright_white(),
        mask_connection_string(database_url).bright_black()
    );

    let pool = bootstrap::open_pool(database_url, config).await?;

    match action {
        DbAction::Check => {
            println!("{}", "🔍 Checking database connection...".bright_blue());

            sqlx::query("SELECT 1").fetch_one(&pool).await?;

            let entities: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entities")
                .fetch_one(&pool)
                .await
                .unwrap_or(0);

            println!("{}", "✅ Database connection OK".green().bold());
            println!(
                "  Stored entities: {}",
                entities.to_string().bright_green().bold()
            );
        }
        DbAction::Migrate => {
            println!("{}", "🛠️  Applying migrations...".bright_blue());

            bootstrap::run_migrations(&pool).await?;

            println!("{}", "✅ Migrations applied".green().bold());
        }
    }

    Ok(())
}
