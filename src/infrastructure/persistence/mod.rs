//! Persistence engines behind [`crate::application::BaseRepository`].
//!
//! - [`PersistenceEngine`] - Storage interface for one entity type
//! - [`MemoryStore`] - In-process engine (tests, embedded use)
//! - [`PgStore`] - PostgreSQL engine storing JSONB documents

mod engine;
mod memory_store;
mod pg_store;

pub use engine::{PersistenceEngine, StoreError, StoreResult, Write};
pub use memory_store::MemoryStore;
pub use pg_store::PgStore;
