//! Persistence engine interface consumed by [`crate::application::BaseRepository`].

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{Criteria, Entity, EntityId};
use crate::domain::pagination::{CursorPosition, SortSpec};
use crate::error::WriteAction;

/// Errors raised by a persistence engine.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The engine refused the write (e.g. updating a row that does not exist).
    #[error("write rejected: {0}")]
    Rejected(String),

    #[error("unique constraint violation: {0}")]
    Conflict(String),

    /// One write of a transaction failed; the whole transaction was rolled back.
    #[error("write {index} of batch failed: {reason}")]
    BatchFailed { index: usize, reason: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored document is invalid: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One write inside [`PersistenceEngine::transaction`].
#[derive(Debug, Clone)]
pub enum Write<E> {
    Insert(E),
    Update(E),
    Delete(EntityId),
}

impl<E> Write<E> {
    pub fn action(&self) -> WriteAction {
        match self {
            Self::Insert(_) => WriteAction::Create,
            Self::Update(_) => WriteAction::Update,
            Self::Delete(_) => WriteAction::Delete,
        }
    }
}

/// Storage for one entity type.
///
/// Entities returned by an engine always have their key set and
/// `exists() == true`. Listings are ordered by key unless a [`SortSpec`] says
/// otherwise.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::MemoryStore`] - In-process engine
/// - [`crate::infrastructure::persistence::PgStore`] - PostgreSQL JSONB engine
#[async_trait]
pub trait PersistenceEngine<E: Entity>: Send + Sync {
    async fn find(&self, id: EntityId) -> StoreResult<Option<E>>;

    /// First match in key order.
    async fn first_where(&self, criteria: &Criteria) -> StoreResult<Option<E>>;

    /// Every match in key order.
    async fn list(&self, criteria: &Criteria) -> StoreResult<Vec<E>>;

    /// Matches `offset..offset + limit` in key order, plus the total number of matches.
    async fn page(&self, criteria: &Criteria, offset: u64, limit: u64) -> StoreResult<(Vec<E>, u64)>;

    /// Up to `limit` matches strictly after `after` in `(sort value, key)` order.
    async fn seek(
        &self,
        criteria: &Criteria,
        sort: &SortSpec,
        after: Option<&CursorPosition>,
        limit: u64,
    ) -> StoreResult<Vec<E>>;

    /// Inserts the entity, assigning a key when it has none.
    async fn insert(&self, entity: E) -> StoreResult<E>;

    /// Replaces the stored entity with the same key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Rejected`] when no such entity is stored.
    async fn update(&self, entity: E) -> StoreResult<E>;

    /// Removes the entity with key `id`; returns whether anything was removed.
    async fn remove(&self, id: EntityId) -> StoreResult<bool>;

    /// Applies every write or none of them.
    ///
    /// Returns the persisted entities of the insert and update writes, in order.
    /// A delete that removes nothing fails the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BatchFailed`] naming the first failing write.
    async fn transaction(&self, writes: Vec<Write<E>>) -> StoreResult<Vec<E>>;
}
