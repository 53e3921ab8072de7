//! Repository working directly against a persistence engine.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use validator::Validate;

use crate::domain::entities::{Criteria, Entity, EntityId, check_entity_contract, visible_fields};
use crate::domain::pagination::{CursorPosition, CursorRequest, CursorResult, Page, PagingInfo};
use crate::domain::repositories::{
    ReadContext, ReadOperation, ReadOperations, Repository, is_read_operation,
};
use crate::domain::validation::{NoValidationRules, ValidationRuleProvider, ValidationRules};
use crate::error::{RepositoryError, RepositoryResult, WriteAction};
use crate::infrastructure::persistence::{PersistenceEngine, StoreError, Write};

/// The single source of truth for one entity type.
///
/// Reads and writes go straight to the injected [`PersistenceEngine`]; batch
/// writes use its transaction so they are all-or-nothing.
///
/// # Examples
///
/// ```ignore
/// let store = Arc::new(MemoryStore::<Article>::new());
/// let repo = BaseRepository::new(store)?
///     .with_validation_rules(|_: Option<&Article>| ValidationRules::new().rule("title", ["required"]))
///     .with_read_operation("get_count", Arc::new(CountWhere))?;
/// ```
pub struct BaseRepository<E: Entity> {
    store: Arc<dyn PersistenceEngine<E>>,
    rules: Arc<dyn ValidationRuleProvider<E>>,
    reads: ReadOperations<E>,
    identity: String,
}

impl<E: Entity> BaseRepository<E> {
    /// Creates a repository for `E` over `store`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Configuration`] if `E` does not satisfy the
    /// base entity contract (see [`check_entity_contract`]).
    pub fn new(store: Arc<dyn PersistenceEngine<E>>) -> RepositoryResult<Self> {
        let identity = format!("{}Repository", E::NAME);
        check_entity_contract::<E>()
            .map_err(|message| RepositoryError::configuration(&identity, message))?;

        Ok(Self {
            store,
            rules: Arc::new(NoValidationRules),
            reads: ReadOperations::new(),
            identity,
        })
    }

    /// Sets the provider answering [`Repository::validation_rules`].
    pub fn with_validation_rules<P>(mut self, provider: P) -> Self
    where
        P: ValidationRuleProvider<E> + 'static,
    {
        self.rules = Arc::new(provider);
        self
    }

    /// Registers an extra read operation reachable through [`Repository::call_read`].
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Configuration`] if `name` does not start with
    /// `get`, shadows a built-in read, or is already registered.
    pub fn with_read_operation(
        mut self,
        name: impl Into<String>,
        operation: Arc<dyn ReadOperation<E>>,
    ) -> RepositoryResult<Self> {
        self.reads
            .register(name, operation)
            .map_err(|message| RepositoryError::configuration(&self.identity, message))?;
        Ok(self)
    }

    fn write_failure(&self, action: WriteAction, error: StoreError) -> RepositoryError {
        RepositoryError::persistence(&self.identity, action, error.to_string())
    }

    fn invalid(&self, message: impl Into<String>) -> RepositoryError {
        RepositoryError::invalid_argument(&self.identity, message)
    }
}

#[async_trait]
impl<E: Entity> Repository<E> for BaseRepository<E> {
    fn identity(&self) -> &str {
        &self.identity
    }

    async fn find(&self, id: EntityId) -> RepositoryResult<Option<E>> {
        Ok(self.store.find(id).await?)
    }

    async fn find_where(&self, criteria: &Criteria) -> RepositoryResult<Option<E>> {
        Ok(self.store.first_where(criteria).await?)
    }

    async fn save(&self, entity: E) -> RepositoryResult<E> {
        if entity.exists() {
            self.store
                .update(entity)
                .await
                .map_err(|e| self.write_failure(WriteAction::Update, e))
        } else {
            self.store
                .insert(entity)
                .await
                .map_err(|e| self.write_failure(WriteAction::Create, e))
        }
    }

    async fn save_many(&self, entities: Vec<E>) -> RepositoryResult<Vec<E>> {
        let writes: Vec<Write<E>> = entities
            .into_iter()
            .map(|entity| {
                if entity.exists() {
                    Write::Update(entity)
                } else {
                    Write::Insert(entity)
                }
            })
            .collect();
        let actions: Vec<WriteAction> = writes.iter().map(Write::action).collect();

        debug!("{}: saving {} entities in one transaction", self.identity, writes.len());

        self.store.transaction(writes).await.map_err(|e| match e {
            StoreError::BatchFailed { index, reason } => RepositoryError::persistence(
                &self.identity,
                actions.get(index).copied().unwrap_or(WriteAction::Create),
                format!("entity {} of batch: {}; batch rolled back", index, reason),
            ),
            other => self.write_failure(WriteAction::Create, other),
        })
    }

    async fn delete(&self, entity: &E) -> RepositoryResult<()> {
        let Some(id) = entity.key() else {
            return Err(RepositoryError::persistence(
                &self.identity,
                WriteAction::Delete,
                "entity has no key",
            ));
        };

        let removed = self
            .store
            .remove(id)
            .await
            .map_err(|e| self.write_failure(WriteAction::Delete, e))?;

        if !removed {
            return Err(RepositoryError::persistence(
                &self.identity,
                WriteAction::Delete,
                format!("no stored entity with key {}", id),
            ));
        }

        Ok(())
    }

    async fn delete_many(&self, entities: &[E]) -> RepositoryResult<()> {
        let mut writes = Vec::with_capacity(entities.len());
        for (index, entity) in entities.iter().enumerate() {
            let Some(id) = entity.key() else {
                return Err(RepositoryError::persistence(
                    &self.identity,
                    WriteAction::Delete,
                    format!("entity {} of batch has no key", index),
                ));
            };
            writes.push(Write::Delete(id));
        }

        self.store
            .transaction(writes)
            .await
            .map(|_| ())
            .map_err(|e| self.write_failure(WriteAction::Delete, e))
    }

    async fn get(&self) -> RepositoryResult<Vec<E>> {
        Ok(self.store.list(&Criteria::new()).await?)
    }

    async fn get_where(&self, criteria: &Criteria) -> RepositoryResult<Vec<E>> {
        if criteria.is_empty() {
            return self.get().await;
        }
        Ok(self.store.list(criteria).await?)
    }

    async fn get_page(
        &self,
        paging: &PagingInfo,
        criteria: Option<&Criteria>,
    ) -> RepositoryResult<Page<E>> {
        paging
            .validate()
            .map_err(|e| self.invalid(format!("invalid paging: {}", e)))?;

        let criteria = criteria.cloned().unwrap_or_default();
        let (items, total) = self
            .store
            .page(&criteria, paging.offset(), u64::from(paging.page_size))
            .await?;

        Ok(Page {
            items,
            total,
            page: paging.page,
            page_size: paging.page_size,
        })
    }

    async fn get_cursor_page(
        &self,
        request: &CursorRequest,
        criteria: Option<&Criteria>,
    ) -> RepositoryResult<CursorResult<E>> {
        request
            .validate()
            .map_err(|e| self.invalid(format!("invalid cursor request: {}", e)))?;

        let after = match &request.cursor {
            Some(cursor) => {
                let position = CursorPosition::decode(cursor).map_err(|e| self.invalid(e))?;
                if position.field != request.sort.field {
                    return Err(self.invalid(
                        "cursor was issued for a different sort field",
                    ));
                }
                Some(position)
            }
            None => None,
        };

        let criteria = criteria.cloned().unwrap_or_default();
        let page_size = usize::try_from(request.page_size).unwrap_or(usize::MAX);

        // One extra row tells whether another page exists.
        let mut items = self
            .store
            .seek(
                &criteria,
                &request.sort,
                after.as_ref(),
                u64::from(request.page_size) + 1,
            )
            .await?;

        let has_more = items.len() > page_size;
        items.truncate(page_size);

        let next_cursor = match items.last() {
            Some(last) if has_more => CursorPosition::of(last, &request.sort)?
                .map(|position| position.encode())
                .transpose()?,
            _ => None,
        };

        Ok(CursorResult::new(items, next_cursor))
    }

    async fn validation_rules(&self, entity: Option<&E>) -> RepositoryResult<ValidationRules> {
        Ok(self.rules.rules_for(entity))
    }

    async fn visible_fields(&self) -> RepositoryResult<Vec<String>> {
        Ok(visible_fields::<E>()?)
    }

    async fn call_read(&self, operation: &str, args: &[Value]) -> RepositoryResult<Value> {
        if !is_read_operation(operation) {
            return Err(RepositoryError::unsupported(&self.identity, operation));
        }
        let Some(handler) = self.reads.get(operation) else {
            return Err(RepositoryError::unsupported(&self.identity, operation));
        };

        let ctx = ReadContext {
            repository: &self.identity,
            store: self.store.as_ref(),
        };
        handler.call(ctx, args).await
    }
}
