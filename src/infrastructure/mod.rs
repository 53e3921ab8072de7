//! Infrastructure layer for external integrations.
//!
//! This layer provides the concrete collaborators the repositories are built
//! from: where entities are persisted and where read results are cached.
//!
//! # Modules
//!
//! - [`cache`] - Cache stores (Redis, in-process LRU, no-op) and key derivation
//! - [`persistence`] - Persistence engines (PostgreSQL, in-memory)

pub mod cache;
pub mod persistence;
