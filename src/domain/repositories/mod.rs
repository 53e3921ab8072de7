//! Repository trait definitions for the domain layer.
//!
//! This module defines the repository interface that abstracts data access
//! for any [`Entity`](crate::domain::entities::Entity) type. It is implemented
//! by [`crate::application::BaseRepository`] and decorated by
//! [`crate::application::CachingRepository`].
//!
//! # Contents
//!
//! - [`Repository`] - Uniform fetch/page/mutate interface
//! - [`ReadOperations`] - Explicit registry of extra `get*` reads
//!
//! # Testing
//!
//! See integration tests in `tests/repository_*.rs` for usage examples.

pub mod read_operation;
pub mod repository;

pub use read_operation::{CountWhere, ReadContext, ReadOperation, ReadOperations};
pub use repository::{BUILT_IN_READS, READ_PREFIX, Repository, is_read_operation};
