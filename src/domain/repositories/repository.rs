//! The repository interface shared by the base and caching implementations.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::entities::{Criteria, Entity, EntityId};
use crate::domain::pagination::{CursorRequest, CursorResult, Page, PagingInfo};
use crate::domain::validation::ValidationRules;
use crate::error::{RepositoryError, RepositoryResult};

/// Operations reachable through [`Repository::call_read`] must start with this prefix.
pub const READ_PREFIX: &str = "get";

/// Names of the reads every repository defines; registered operations may not shadow them.
pub const BUILT_IN_READS: &[&str] = &["get", "get_where", "get_page", "get_cursor_page"];

/// True when `operation` is read-shaped and may be proxied generically.
pub fn is_read_operation(operation: &str) -> bool {
    operation.starts_with(READ_PREFIX)
}

/// Data access for one entity type.
///
/// Implemented by [`crate::application::BaseRepository`] against a persistence
/// engine and by [`crate::application::CachingRepository`] as a decorator over
/// any other implementation. Callers can be handed either one.
///
/// # Implementations
///
/// - [`crate::application::BaseRepository`] - Direct access to a [`crate::infrastructure::persistence::PersistenceEngine`]
/// - [`crate::application::CachingRepository`] - Cache-aside decorator
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    /// Identity reported in errors and logs.
    fn identity(&self) -> &str;

    /// Looks an entity up by key.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Store`] on engine errors.
    async fn find(&self, id: EntityId) -> RepositoryResult<Option<E>>;

    /// Looks an entity up by key, failing when it is absent.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] if no entity has key `id`.
    async fn find_or_fail(&self, id: EntityId) -> RepositoryResult<E> {
        self.find(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found(self.identity(), id))
    }

    /// Looks an entity up by key, or returns a fresh unpersisted instance.
    ///
    /// The fresh instance is `E::default()`: it has no key and `exists() == false`.
    async fn find_or_new(&self, id: EntityId) -> RepositoryResult<E> {
        Ok(self.find(id).await?.unwrap_or_default())
    }

    /// First entity (by key) matching every field of `criteria`.
    async fn find_where(&self, criteria: &Criteria) -> RepositoryResult<Option<E>>;

    /// Inserts the entity if it does not exist yet, updates it otherwise.
    ///
    /// Returns the persisted entity, with its key assigned and `exists() == true`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::PersistenceFailure`] naming `create` or
    /// `update` when the store rejects the write.
    async fn save(&self, entity: E) -> RepositoryResult<E>;

    /// Synonym for [`Repository::save`], kept for older callers.
    async fn create(&self, entity: E) -> RepositoryResult<E> {
        self.save(entity).await
    }

    /// Saves every entity in one transaction. Either all are persisted or none.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::PersistenceFailure`] for the first failing
    /// entity; nothing from the batch is persisted.
    async fn save_many(&self, entities: Vec<E>) -> RepositoryResult<Vec<E>>;

    /// Removes the entity.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::PersistenceFailure`] if the entity has no key
    /// or the store did not remove anything.
    async fn delete(&self, entity: &E) -> RepositoryResult<()>;

    /// Removes every entity in one transaction. Either all are removed or none.
    async fn delete_many(&self, entities: &[E]) -> RepositoryResult<()>;

    /// Every entity, in key order. Unbounded.
    async fn get(&self) -> RepositoryResult<Vec<E>>;

    /// Every entity matching `criteria`, in key order. Empty criteria match all.
    async fn get_where(&self, criteria: &Criteria) -> RepositoryResult<Vec<E>>;

    /// One offset page, in key order, with the total count of matches.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::InvalidArgument`] for a zero page or page size.
    async fn get_page(
        &self,
        paging: &PagingInfo,
        criteria: Option<&Criteria>,
    ) -> RepositoryResult<Page<E>>;

    /// Records strictly after the request's cursor, in `(sort value, key)` order.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::InvalidArgument`] for a malformed cursor, a
    /// cursor issued under a different sort field, or an invalid page size.
    async fn get_cursor_page(
        &self,
        request: &CursorRequest,
        criteria: Option<&Criteria>,
    ) -> RepositoryResult<CursorResult<E>>;

    /// Validation rules for the entity type, optionally for one instance.
    async fn validation_rules(&self, entity: Option<&E>) -> RepositoryResult<ValidationRules>;

    /// Serialized field names of the entity type, minus hidden ones.
    async fn visible_fields(&self) -> RepositoryResult<Vec<String>>;

    /// Runs an extra read operation by name over JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::UnsupportedOperation`] if `operation` does not
    /// start with [`READ_PREFIX`] or is not known to the repository.
    async fn call_read(&self, operation: &str, args: &[Value]) -> RepositoryResult<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_read_operation() {
        assert!(is_read_operation("get"));
        assert!(is_read_operation("get_published"));
        assert!(!is_read_operation("delete_all"));
        assert!(!is_read_operation("Get_published"));
        assert!(!is_read_operation(""));
    }
}
