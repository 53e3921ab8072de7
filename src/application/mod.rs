//! Repository implementations.
//!
//! - [`BaseRepository`] - Direct access to a persistence engine
//! - [`CachingRepository`] - Cache-aside decorator over any repository
//!
//! Both implement [`crate::domain::repositories::Repository`], so callers can
//! be handed either one.

mod base_repository;
mod caching_repository;

pub use base_repository::BaseRepository;
pub use caching_repository::CachingRepository;
