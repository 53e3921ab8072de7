//! In-process persistence engine.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::engine::{PersistenceEngine, StoreError, StoreResult, Write};
use crate::domain::entities::{Criteria, Entity, EntityId};
use crate::domain::pagination::{CursorPosition, SortSpec};

#[derive(Debug, Clone)]
struct Rows<E> {
    rows: BTreeMap<EntityId, E>,
    next_id: EntityId,
}

impl<E: Entity> Rows<E> {
    fn insert(&mut self, mut entity: E) -> StoreResult<E> {
        let id = match entity.key() {
            Some(id) if self.rows.contains_key(&id) => {
                return Err(StoreError::Conflict(format!(
                    "{} with key {} already exists",
                    E::NAME,
                    id
                )));
            }
            Some(id) => id,
            None if self.rows.contains_key(&self.next_id) => {
                return Err(StoreError::Rejected(format!(
                    "no {} keys left to assign",
                    E::NAME
                )));
            }
            None => self.next_id,
        };

        self.next_id = self.next_id.max(id.saturating_add(1));
        entity.set_key(id);
        entity.set_exists(true);
        self.rows.insert(id, entity.clone());

        Ok(entity)
    }

    fn update(&mut self, mut entity: E) -> StoreResult<E> {
        let Some(id) = entity.key() else {
            return Err(StoreError::Rejected(format!(
                "cannot update {} without a key",
                E::NAME
            )));
        };
        let Some(slot) = self.rows.get_mut(&id) else {
            return Err(StoreError::Rejected(format!(
                "no stored {} with key {}",
                E::NAME,
                id
            )));
        };

        entity.set_exists(true);
        *slot = entity.clone();

        Ok(entity)
    }

    fn remove(&mut self, id: EntityId) -> bool {
        self.rows.remove(&id).is_some()
    }

    /// Matching rows in key order, paired with their serialized form.
    fn matching(&self, criteria: &Criteria) -> StoreResult<Vec<(serde_json::Value, &E)>> {
        let mut matches = Vec::new();
        for entity in self.rows.values() {
            let document = serde_json::to_value(entity)?;
            if criteria.matches(&document) {
                matches.push((document, entity));
            }
        }
        Ok(matches)
    }
}

/// Persistence engine keeping entities in memory, keyed by an auto-incremented id.
///
/// Writers are serialized by a lock. Transactions are applied to a copy of the
/// rows which replaces the live rows only if every write succeeded.
#[derive(Debug, Clone)]
pub struct MemoryStore<E> {
    state: Arc<RwLock<Rows<E>>>,
}

impl<E: Entity> MemoryStore<E> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(Rows {
                rows: BTreeMap::new(),
                next_id: 1,
            })),
        }
    }

    /// Number of stored entities.
    pub async fn len(&self) -> usize {
        self.state.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.rows.is_empty()
    }
}

impl<E: Entity> Default for MemoryStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Entity> PersistenceEngine<E> for MemoryStore<E> {
    async fn find(&self, id: EntityId) -> StoreResult<Option<E>> {
        Ok(self.state.read().await.rows.get(&id).cloned())
    }

    async fn first_where(&self, criteria: &Criteria) -> StoreResult<Option<E>> {
        let state = self.state.read().await;
        let matches = state.matching(criteria)?;
        Ok(matches.into_iter().next().map(|(_, entity)| entity.clone()))
    }

    async fn list(&self, criteria: &Criteria) -> StoreResult<Vec<E>> {
        let state = self.state.read().await;
        let matches = state.matching(criteria)?;
        Ok(matches.into_iter().map(|(_, entity)| entity.clone()).collect())
    }

    async fn page(&self, criteria: &Criteria, offset: u64, limit: u64) -> StoreResult<(Vec<E>, u64)> {
        let state = self.state.read().await;
        let matches = state.matching(criteria)?;
        let total = matches.len() as u64;

        let items = matches
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .map(|(_, entity)| entity.clone())
            .collect();

        Ok((items, total))
    }

    async fn seek(
        &self,
        criteria: &Criteria,
        sort: &SortSpec,
        after: Option<&CursorPosition>,
        limit: u64,
    ) -> StoreResult<Vec<E>> {
        let state = self.state.read().await;

        let mut positioned: Vec<(serde_json::Value, EntityId, &E)> = state
            .matching(criteria)?
            .into_iter()
            .filter_map(|(document, entity)| {
                entity
                    .key()
                    .map(|key| (sort.value_of(&document), key, entity))
            })
            .filter(|(value, key, _)| {
                after.is_none_or(|position| {
                    sort.compare((value, *key), (&position.value, position.key))
                        .is_gt()
                })
            })
            .collect();

        positioned.sort_by(|a, b| sort.compare((&a.0, a.1), (&b.0, b.1)));

        Ok(positioned
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .map(|(_, _, entity)| entity.clone())
            .collect())
    }

    async fn insert(&self, entity: E) -> StoreResult<E> {
        self.state.write().await.insert(entity)
    }

    async fn update(&self, entity: E) -> StoreResult<E> {
        self.state.write().await.update(entity)
    }

    async fn remove(&self, id: EntityId) -> StoreResult<bool> {
        Ok(self.state.write().await.remove(id))
    }

    async fn transaction(&self, writes: Vec<Write<E>>) -> StoreResult<Vec<E>> {
        let mut state = self.state.write().await;
        let mut staged = state.clone();
        let mut persisted = Vec::with_capacity(writes.len());

        for (index, write) in writes.into_iter().enumerate() {
            let outcome = match write {
                Write::Insert(entity) => staged.insert(entity).map(Some),
                Write::Update(entity) => staged.update(entity).map(Some),
                Write::Delete(id) => {
                    if staged.remove(id) {
                        Ok(None)
                    } else {
                        Err(StoreError::Rejected(format!(
                            "no stored {} with key {}",
                            E::NAME,
                            id
                        )))
                    }
                }
            };

            match outcome {
                Ok(Some(entity)) => persisted.push(entity),
                Ok(None) => {}
                Err(e) => {
                    debug!("Rolling back {} transaction at write {}: {}", E::NAME, index, e);
                    return Err(StoreError::BatchFailed {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        *state = staged;
        Ok(persisted)
    }
}
