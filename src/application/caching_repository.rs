//! Cache-aside decorator over any [`Repository`].
//!
//! Reads are served from a [`CacheStore`] when possible and populated from the
//! inner repository on a miss. `save` and `delete` forget only the entity's own
//! key and the `get()` listing; filtered listings, pages and generic reads keep
//! their entries until the TTL expires. Batch writes do not invalidate at all.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::entities::{Criteria, Entity, EntityId};
use crate::domain::pagination::{CursorRequest, CursorResult, Page, PagingInfo};
use crate::domain::repositories::{Repository, is_read_operation};
use crate::domain::validation::ValidationRules;
use crate::error::{RepositoryError, RepositoryResult};
use crate::infrastructure::cache::{CacheKeys, CacheStore};

const HITS: &str = "repository_cache_hits_total";
const MISSES: &str = "repository_cache_misses_total";
const INVALIDATIONS: &str = "repository_cache_invalidations_total";

/// Caching decorator. Callers can use it wherever a [`Repository`] is expected.
///
/// # Examples
///
/// ```ignore
/// let base = Arc::new(BaseRepository::new(Arc::new(MemoryStore::<Article>::new()))?);
/// let cache = Arc::new(MemoryCache::new(10_000));
/// let repo = CachingRepository::new(base, cache, "article", Duration::from_secs(3600));
///
/// let article = repo.find_or_fail(1).await?; // miss, loads and caches "article:1"
/// let again = repo.find_or_fail(1).await?;   // hit
/// ```
pub struct CachingRepository<E, R, C>
where
    E: Entity,
    R: Repository<E> + ?Sized,
    C: CacheStore + ?Sized,
{
    inner: Arc<R>,
    cache: Arc<C>,
    keys: CacheKeys,
    ttl: Duration,
    _entity: PhantomData<fn() -> E>,
}

impl<E, R, C> CachingRepository<E, R, C>
where
    E: Entity,
    R: Repository<E> + ?Sized,
    C: CacheStore + ?Sized,
{
    /// Wraps `inner`, caching its reads in `cache` under keys starting with `prefix`.
    pub fn new(inner: Arc<R>, cache: Arc<C>, prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            inner,
            cache,
            keys: CacheKeys::new(prefix),
            ttl,
            _entity: PhantomData,
        }
    }

    pub fn keys(&self) -> &CacheKeys {
        &self.keys
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The decorated repository.
    pub fn inner(&self) -> &Arc<R> {
        &self.inner
    }

    /// Cached value under `key`. A payload that no longer decodes counts as a miss.
    async fn lookup<T: DeserializeOwned + Send>(&self, key: &str) -> RepositoryResult<Option<T>> {
        let Some(payload) = self.cache.get(key).await? else {
            debug!("Cache MISS: {}", key);
            counter!(MISSES, "prefix" => self.keys.prefix().to_string()).increment(1);
            return Ok(None);
        };

        match serde_json::from_str(&payload) {
            Ok(value) => {
                debug!("Cache HIT: {}", key);
                counter!(HITS, "prefix" => self.keys.prefix().to_string()).increment(1);
                Ok(Some(value))
            }
            Err(e) => {
                warn!("Discarding undecodable cache entry {}: {}", key, e);
                counter!(MISSES, "prefix" => self.keys.prefix().to_string()).increment(1);
                Ok(None)
            }
        }
    }

    async fn store<T: Serialize + Sync>(&self, key: &str, value: &T) -> RepositoryResult<()> {
        let payload = serde_json::to_string(value)?;
        self.cache.put(key, payload, self.ttl).await?;
        Ok(())
    }

    /// Cache-aside: the cached value under `key`, or the result of `load`, which is then cached.
    ///
    /// `restore` runs on cached values only, before they are returned.
    async fn remember<T, F, P>(&self, key: String, load: F, restore: P) -> RepositoryResult<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: Future<Output = RepositoryResult<T>> + Send,
        P: FnOnce(&mut T) + Send,
    {
        if let Some(mut cached) = self.lookup(&key).await? {
            restore(&mut cached);
            return Ok(cached);
        }

        let value = load.await?;
        self.store(&key, &value).await?;
        Ok(value)
    }

    async fn forget(&self, key: &str) -> RepositoryResult<()> {
        self.cache.forget(key).await?;
        debug!("Cache INVALIDATE: {}", key);
        counter!(INVALIDATIONS, "prefix" => self.keys.prefix().to_string()).increment(1);
        Ok(())
    }

    /// Forgets the entity entry (when keyed) and the `get()` listing.
    async fn invalidate(&self, id: Option<EntityId>) -> RepositoryResult<()> {
        if let Some(id) = id {
            self.forget(&self.keys.entity(id)).await?;
        }
        self.forget(&self.keys.all()).await
    }
}

/// Sets the existence flag of keyed entities decoded from the cache.
///
/// The flag belongs to the store and need not survive serialization.
fn mark_persisted<E: Entity>(entities: &mut [E]) {
    for entity in entities.iter_mut().filter(|entity| entity.key().is_some()) {
        entity.set_exists(true);
    }
}

#[async_trait]
impl<E, R, C> Repository<E> for CachingRepository<E, R, C>
where
    E: Entity,
    R: Repository<E> + ?Sized,
    C: CacheStore + ?Sized,
{
    fn identity(&self) -> &str {
        self.inner.identity()
    }

    async fn find(&self, id: EntityId) -> RepositoryResult<Option<E>> {
        let key = self.keys.entity(id);
        if let Some(mut entity) = self.lookup::<E>(&key).await? {
            mark_persisted(std::slice::from_mut(&mut entity));
            return Ok(Some(entity));
        }

        // Absence is not cached.
        let found = self.inner.find(id).await?;
        if let Some(entity) = &found {
            self.store(&key, entity).await?;
        }
        Ok(found)
    }

    async fn find_where(&self, criteria: &Criteria) -> RepositoryResult<Option<E>> {
        let key = self.keys.operation("find_where", &(criteria,))?;
        self.remember(key, self.inner.find_where(criteria), |found: &mut Option<E>| {
            mark_persisted(found.as_mut_slice())
        })
        .await
    }

    async fn save(&self, entity: E) -> RepositoryResult<E> {
        let saved = self.inner.save(entity).await?;
        self.invalidate(saved.key()).await?;
        Ok(saved)
    }

    async fn save_many(&self, entities: Vec<E>) -> RepositoryResult<Vec<E>> {
        self.inner.save_many(entities).await
    }

    async fn delete(&self, entity: &E) -> RepositoryResult<()> {
        self.inner.delete(entity).await?;
        self.invalidate(entity.key()).await
    }

    async fn delete_many(&self, entities: &[E]) -> RepositoryResult<()> {
        self.inner.delete_many(entities).await
    }

    async fn get(&self) -> RepositoryResult<Vec<E>> {
        self.remember(self.keys.all(), self.inner.get(), |items: &mut Vec<E>| {
            mark_persisted(items)
        })
        .await
    }

    async fn get_where(&self, criteria: &Criteria) -> RepositoryResult<Vec<E>> {
        let key = self.keys.operation("get_where", &(criteria,))?;
        self.remember(key, self.inner.get_where(criteria), |items: &mut Vec<E>| {
            mark_persisted(items)
        })
        .await
    }

    async fn get_page(
        &self,
        paging: &PagingInfo,
        criteria: Option<&Criteria>,
    ) -> RepositoryResult<Page<E>> {
        let key = self.keys.operation("get_page", &(paging, criteria))?;
        self.remember(key, self.inner.get_page(paging, criteria), |page: &mut Page<E>| {
            mark_persisted(&mut page.items)
        })
        .await
    }

    async fn get_cursor_page(
        &self,
        request: &CursorRequest,
        criteria: Option<&Criteria>,
    ) -> RepositoryResult<CursorResult<E>> {
        let key = self.keys.operation("get_cursor_page", &(request, criteria))?;
        self.remember(
            key,
            self.inner.get_cursor_page(request, criteria),
            |page: &mut CursorResult<E>| mark_persisted(&mut page.items),
        )
        .await
    }

    async fn validation_rules(&self, entity: Option<&E>) -> RepositoryResult<ValidationRules> {
        let key = match entity {
            Some(entity) => self.keys.operation("validation_rules", &(entity,))?,
            None => self.keys.property("validation_rules"),
        };
        self.remember(key, self.inner.validation_rules(entity), |_| {})
            .await
    }

    async fn visible_fields(&self) -> RepositoryResult<Vec<String>> {
        self.remember(
            self.keys.property("visible_fields"),
            self.inner.visible_fields(),
            |_| {},
        )
        .await
    }

    async fn call_read(&self, operation: &str, args: &[Value]) -> RepositoryResult<Value> {
        if !is_read_operation(operation) {
            return Err(RepositoryError::unsupported(self.identity(), operation));
        }

        let key = self.keys.operation(operation, args)?;
        self.remember(key, self.inner.call_read(operation, args), |_| {})
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde::Deserialize;

    use crate::application::BaseRepository;
    use crate::infrastructure::cache::{CacheError, MockCacheStore};
    use crate::infrastructure::persistence::MemoryStore;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: Option<EntityId>,
        #[serde(default)]
        exists: bool,
        text: String,
    }

    impl Entity for Note {
        const NAME: &'static str = "Note";

        fn key(&self) -> Option<EntityId> {
            self.id
        }
        fn set_key(&mut self, key: EntityId) {
            self.id = Some(key);
        }
        fn exists(&self) -> bool {
            self.exists
        }
        fn set_exists(&mut self, exists: bool) {
            self.exists = exists;
        }
    }

    /// Counts every call that reaches the wrapped repository.
    struct Counting {
        inner: BaseRepository<Note>,
        calls: AtomicUsize,
    }

    impl Counting {
        fn new() -> Self {
            Self {
                inner: BaseRepository::new(Arc::new(MemoryStore::<Note>::new())).unwrap(),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn touch(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Repository<Note> for Counting {
        fn identity(&self) -> &str {
            self.inner.identity()
        }
        async fn find(&self, id: EntityId) -> RepositoryResult<Option<Note>> {
            self.touch();
            self.inner.find(id).await
        }
        async fn find_where(&self, criteria: &Criteria) -> RepositoryResult<Option<Note>> {
            self.touch();
            self.inner.find_where(criteria).await
        }
        async fn save(&self, entity: Note) -> RepositoryResult<Note> {
            self.touch();
            self.inner.save(entity).await
        }
        async fn save_many(&self, entities: Vec<Note>) -> RepositoryResult<Vec<Note>> {
            self.touch();
            self.inner.save_many(entities).await
        }
        async fn delete(&self, entity: &Note) -> RepositoryResult<()> {
            self.touch();
            self.inner.delete(entity).await
        }
        async fn delete_many(&self, entities: &[Note]) -> RepositoryResult<()> {
            self.touch();
            self.inner.delete_many(entities).await
        }
        async fn get(&self) -> RepositoryResult<Vec<Note>> {
            self.touch();
            self.inner.get().await
        }
        async fn get_where(&self, criteria: &Criteria) -> RepositoryResult<Vec<Note>> {
            self.touch();
            self.inner.get_where(criteria).await
        }
        async fn get_page(
            &self,
            paging: &PagingInfo,
            criteria: Option<&Criteria>,
        ) -> RepositoryResult<Page<Note>> {
            self.touch();
            self.inner.get_page(paging, criteria).await
        }
        async fn get_cursor_page(
            &self,
            request: &CursorRequest,
            criteria: Option<&Criteria>,
        ) -> RepositoryResult<CursorResult<Note>> {
            self.touch();
            self.inner.get_cursor_page(request, criteria).await
        }
        async fn validation_rules(
            &self,
            entity: Option<&Note>,
        ) -> RepositoryResult<ValidationRules> {
            self.touch();
            self.inner.validation_rules(entity).await
        }
        async fn visible_fields(&self) -> RepositoryResult<Vec<String>> {
            self.touch();
            self.inner.visible_fields().await
        }
        async fn call_read(&self, operation: &str, args: &[Value]) -> RepositoryResult<Value> {
            self.touch();
            self.inner.call_read(operation, args).await
        }
    }

    fn decorate(
        inner: Arc<Counting>,
        cache: MockCacheStore,
    ) -> CachingRepository<Note, Counting, MockCacheStore> {
        CachingRepository::new(inner, Arc::new(cache), "note", Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_non_read_operation_touches_nothing() {
        // No expectations: any cache call panics.
        let cache = MockCacheStore::new();
        let inner = Arc::new(Counting::new());
        let repo = decorate(inner.clone(), cache);

        let result = repo.call_read("delete_everything", &[]).await;

        assert!(matches!(
            result,
            Err(RepositoryError::UnsupportedOperation { ref operation, .. })
                if operation == "delete_everything"
        ));
        assert_eq!(inner.calls(), 0);
    }

    #[tokio::test]
    async fn test_find_hit_skips_inner() {
        let payload = serde_json::to_string(&Note {
            id: Some(7),
            exists: true,
            text: "cached".to_string(),
        })
        .unwrap();

        let mut cache = MockCacheStore::new();
        cache
            .expect_get()
            .withf(|key| key == "note:7")
            .times(1)
            .returning(move |_| Ok(Some(payload.clone())));

        let inner = Arc::new(Counting::new());
        let repo = decorate(inner.clone(), cache);

        let note = repo.find_or_fail(7).await.unwrap();

        assert_eq!(note.text, "cached");
        assert!(note.exists);
        assert_eq!(inner.calls(), 0);
    }

    #[tokio::test]
    async fn test_find_miss_of_absent_entity_is_not_cached() {
        let mut cache = MockCacheStore::new();
        cache.expect_get().times(2).returning(|_| Ok(None));
        cache.expect_put().never();

        let inner = Arc::new(Counting::new());
        let repo = decorate(inner.clone(), cache);

        assert!(repo.find(1).await.unwrap().is_none());
        assert!(matches!(
            repo.find_or_fail(1).await,
            Err(RepositoryError::NotFound { id: 1, .. })
        ));
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_a_miss() {
        let mut cache = MockCacheStore::new();
        cache
            .expect_get()
            .withf(|key| key == "note:all")
            .returning(|_| Ok(Some("{not json".to_string())));
        cache
            .expect_put()
            .withf(|key, payload, ttl| {
                key == "note:all" && payload == "[]" && *ttl == Duration::from_secs(60)
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let inner = Arc::new(Counting::new());
        let repo = decorate(inner.clone(), cache);

        assert!(repo.get().await.unwrap().is_empty());
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_errors_propagate() {
        let mut cache = MockCacheStore::new();
        cache
            .expect_get()
            .returning(|_| Err(CacheError::ConnectionError("down".to_string())));

        let inner = Arc::new(Counting::new());
        let repo = decorate(inner.clone(), cache);

        assert!(matches!(
            repo.get().await,
            Err(RepositoryError::Cache(CacheError::ConnectionError(_)))
        ));
        assert_eq!(inner.calls(), 0);
    }

    #[tokio::test]
    async fn test_save_forgets_entity_and_listing_only() {
        let mut cache = MockCacheStore::new();
        cache
            .expect_forget()
            .withf(|key| key == "note:1" || key == "note:all")
            .times(2)
            .returning(|_| Ok(true));

        let inner = Arc::new(Counting::new());
        let repo = decorate(inner.clone(), cache);

        let saved = repo
            .save(Note {
                text: "hello".to_string(),
                ..Note::default()
            })
            .await
            .unwrap();

        assert_eq!(saved.id, Some(1));
    }

    #[tokio::test]
    async fn test_batch_writes_do_not_invalidate() {
        let cache = MockCacheStore::new();
        let inner = Arc::new(Counting::new());
        let repo = decorate(inner.clone(), cache);

        let saved = repo
            .save_many(vec![Note::default(), Note::default()])
            .await
            .unwrap();
        repo.delete_many(&saved).await.unwrap();

        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn test_metadata_uses_property_keys() {
        let mut cache = MockCacheStore::new();
        cache.expect_get().returning(|_| Ok(None));
        cache
            .expect_put()
            .withf(|key, _, _| {
                key == "note:property:visible_fields" || key == "note:property:validation_rules"
            })
            .times(2)
            .returning(|_, _, _| Ok(()));

        let inner = Arc::new(Counting::new());
        let repo = decorate(inner.clone(), cache);

        let mut fields = repo.visible_fields().await.unwrap();
        fields.sort();
        let rules = repo.validation_rules(None).await.unwrap();

        assert_eq!(fields, vec!["exists", "id", "text"]);
        assert!(rules.is_empty());
    }
}
