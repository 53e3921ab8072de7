#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use repocache::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: Option<EntityId>,
    #[serde(default)]
    pub exists: bool,
    pub title: String,
    pub author: String,
    pub status: String,
    pub rank: i64,
}

impl Entity for Article {
    const NAME: &'static str = "Article";

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

pub fn article(title: &str, author: &str, status: &str, rank: i64) -> Article {
    Article {
        title: title.to_string(),
        author: author.to_string(),
        status: status.to_string(),
        rank,
        ..Article::default()
    }
}

/// Entity whose existence flag is not serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Memo {
    pub id: Option<EntityId>,
    #[serde(skip)]
    pub exists: bool,
    pub body: String,
}

impl Entity for Memo {
    const NAME: &'static str = "Memo";

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

pub fn memo(body: &str) -> Memo {
    Memo {
        body: body.to_string(),
        ..Memo::default()
    }
}

/// Memo repository decorated with an in-process cache, plus the cache.
pub fn memo_repository() -> (
    CachingRepository<Memo, BaseRepository<Memo>, MemoryCache>,
    Arc<MemoryCache>,
) {
    let base = Arc::new(BaseRepository::new(Arc::new(MemoryStore::<Memo>::new())).unwrap());
    let cache = Arc::new(MemoryCache::new(100));
    let repo = CachingRepository::new(base, cache.clone(), "memo", TTL);
    (repo, cache)
}

pub fn base_repository() -> BaseRepository<Article> {
    BaseRepository::new(Arc::new(MemoryStore::<Article>::new())).unwrap()
}

pub const TTL: Duration = Duration::from_secs(300);

/// Counts the calls reaching the wrapped repository, per operation.
pub struct CountingRepository {
    inner: BaseRepository<Article>,
    calls: std::sync::Mutex<Vec<String>>,
    total: AtomicUsize,
}

impl CountingRepository {
    pub fn new(inner: BaseRepository<Article>) -> Self {
        Self {
            inner,
            calls: std::sync::Mutex::new(Vec::new()),
            total: AtomicUsize::new(0),
        }
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|name| name.as_str() == operation)
            .count()
    }

    fn record(&self, operation: &str) {
        self.total.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(operation.to_string());
    }
}

#[async_trait]
impl Repository<Article> for CountingRepository {
    fn identity(&self) -> &str {
        self.inner.identity()
    }
    async fn find(&self, id: EntityId) -> RepositoryResult<Option<Article>> {
        self.record("find");
        self.inner.find(id).await
    }
    async fn find_where(&self, criteria: &Criteria) -> RepositoryResult<Option<Article>> {
        self.record("find_where");
        self.inner.find_where(criteria).await
    }
    async fn save(&self, entity: Article) -> RepositoryResult<Article> {
        self.record("save");
        self.inner.save(entity).await
    }
    async fn save_many(&self, entities: Vec<Article>) -> RepositoryResult<Vec<Article>> {
        self.record("save_many");
        self.inner.save_many(entities).await
    }
    async fn delete(&self, entity: &Article) -> RepositoryResult<()> {
        self.record("delete");
        self.inner.delete(entity).await
    }
    async fn delete_many(&self, entities: &[Article]) -> RepositoryResult<()> {
        self.record("delete_many");
        self.inner.delete_many(entities).await
    }
    async fn get(&self) -> RepositoryResult<Vec<Article>> {
        self.record("get");
        self.inner.get().await
    }
    async fn get_where(&self, criteria: &Criteria) -> RepositoryResult<Vec<Article>> {
        self.record("get_where");
        self.inner.get_where(criteria).await
    }
    async fn get_page(
        &self,
        paging: &PagingInfo,
        criteria: Option<&Criteria>,
    ) -> RepositoryResult<Page<Article>> {
        self.record("get_page");
        self.inner.get_page(paging, criteria).await
    }
    async fn get_cursor_page(
        &self,
        request: &CursorRequest,
        criteria: Option<&Criteria>,
    ) -> RepositoryResult<CursorResult<Article>> {
        self.record("get_cursor_page");
        self.inner.get_cursor_page(request, criteria).await
    }
    async fn validation_rules(&self, entity: Option<&Article>) -> RepositoryResult<ValidationRules> {
        self.record("validation_rules");
        self.inner.validation_rules(entity).await
    }
    async fn visible_fields(&self) -> RepositoryResult<Vec<String>> {
        self.record("visible_fields");
        self.inner.visible_fields().await
    }
    async fn call_read(&self, operation: &str, args: &[Value]) -> RepositoryResult<Value> {
        self.record("call_read");
        self.inner.call_read(operation, args).await
    }
}

/// A caching repository over a counting stub, with the cache exposed for inspection.
pub fn caching_repository(
    inner: BaseRepository<Article>,
) -> (
    CachingRepository<Article, CountingRepository, MemoryCache>,
    Arc<CountingRepository>,
    Arc<MemoryCache>,
) {
    let counting = Arc::new(CountingRepository::new(inner));
    let cache = Arc::new(MemoryCache::new(1_000));
    let repo = CachingRepository::new(counting.clone(), cache.clone(), "article", TTL);
    (repo, counting, cache)
}
