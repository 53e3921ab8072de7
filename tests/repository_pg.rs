//! PostgreSQL engine tests. `#[sqlx::test]` creates a database per test
//! from `DATABASE_URL`.

mod common;

use std::sync::Arc;

use common::{Article, article};
use repocache::prelude::*;
use sqlx::PgPool;

fn repository(pool: PgPool) -> BaseRepository<Article> {
    BaseRepository::new(Arc::new(PgStore::<Article>::new(Arc::new(pool)))).unwrap()
}

#[sqlx::test]
async fn test_save_and_find(pool: PgPool) {
    let repo = repository(pool);

    let saved = repo.save(article("a", "ann", "draft", 1)).await.unwrap();
    let id = saved.id.unwrap();

    assert!(saved.exists);
    assert_eq!(repo.find_or_fail(id).await.unwrap(), saved);

    let updated = repo
        .save(Article {
            status: "published".to_string(),
            ..saved
        })
        .await
        .unwrap();
    assert_eq!(repo.find_or_fail(id).await.unwrap().status, "published");
    assert_eq!(updated.id, Some(id));
}

#[sqlx::test]
async fn test_entity_types_are_isolated(pool: PgPool) {
    #[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
    struct Tag {
        id: Option<EntityId>,
        #[serde(default)]
        exists: bool,
        name: String,
    }

    impl Entity for Tag {
        const NAME: &'static str = "Tag";

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

    let pool = Arc::new(pool);
    let articles = BaseRepository::new(Arc::new(PgStore::<Article>::new(pool.clone()))).unwrap();
    let tags = BaseRepository::new(Arc::new(PgStore::<Tag>::new(pool))).unwrap();

    articles.save(article("a", "ann", "draft", 1)).await.unwrap();
    tags.save(Tag {
        name: "rust".to_string(),
        ..Tag::default()
    })
    .await
    .unwrap();

    assert_eq!(articles.get().await.unwrap().len(), 1);
    assert_eq!(tags.get().await.unwrap().len(), 1);
}

#[sqlx::test]
async fn test_criteria_use_containment(pool: PgPool) {
    let repo = repository(pool);
    repo.save(article("a", "ann", "draft", 1)).await.unwrap();
    repo.save(article("b", "ann", "published", 2)).await.unwrap();
    repo.save(article("c", "bob", "published", 3)).await.unwrap();

    let found = repo
        .get_where(&Criteria::new().eq("author", "ann").eq("status", "published"))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "b");

    let ranked = repo
        .find_where(&Criteria::new().eq("rank", 3))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ranked.title, "c");
}

#[sqlx::test]
async fn test_page_counts_total(pool: PgPool) {
    let repo = repository(pool);
    for rank in 0..5 {
        repo.save(article("x", "ann", "draft", rank)).await.unwrap();
    }

    let page = repo.get_page(&PagingInfo::new(2, 2), None).await.unwrap();

    assert_eq!(page.total, 5);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.last_page(), 3);
}

#[sqlx::test]
async fn test_cursor_walk_with_ties(pool: PgPool) {
    let repo = repository(pool);
    for rank in [2, 1, 2, 1, 2] {
        repo.save(article("x", "ann", "draft", rank)).await.unwrap();
    }

    let mut request = Some(CursorRequest::first(2, SortSpec::by("rank").descending()));
    let mut ranks = Vec::new();
    let mut seen = 0;
    while let Some(current) = request {
        let page = repo.get_cursor_page(&current, None).await.unwrap();
        ranks.extend(page.items.iter().map(|a| a.rank));
        seen += page.items.len();
        request = current.next(&page);
    }

    assert_eq!(seen, 5);
    assert_eq!(ranks, vec![2, 2, 2, 1, 1]);
}

#[sqlx::test]
async fn test_save_many_rolls_back(pool: PgPool) {
    let repo = repository(pool);
    let ghost = Article {
        id: Some(999_999),
        exists: true,
        ..article("ghost", "nobody", "draft", 0)
    };

    let result = repo
        .save_many(vec![article("a", "ann", "draft", 1), ghost])
        .await;

    assert!(matches!(
        result,
        Err(RepositoryError::PersistenceFailure {
            action: WriteAction::Update,
            ..
        })
    ));
    assert!(repo.get().await.unwrap().is_empty());
}

#[sqlx::test]
async fn test_delete(pool: PgPool) {
    let repo = repository(pool);
    let saved = repo.save(article("a", "ann", "draft", 1)).await.unwrap();

    repo.delete(&saved).await.unwrap();

    assert!(repo.find(saved.id.unwrap()).await.unwrap().is_none());
    assert!(repo.delete(&saved).await.is_err());
}

#[sqlx::test]
async fn test_keyless_insert_after_explicit_key(pool: PgPool) {
    let repo = repository(pool);

    let explicit = repo
        .save(Article {
            id: Some(3),
            ..article("explicit", "ann", "draft", 1)
        })
        .await
        .unwrap();
    assert_eq!(explicit.id, Some(3));

    let mut assigned = Vec::new();
    for n in 0..3 {
        let saved = repo
            .save(article(&format!("t{n}"), "bob", "draft", n))
            .await
            .unwrap();
        assigned.push(saved.id.unwrap());
    }

    assert!(assigned.iter().all(|id| *id > 3));
    assert_eq!(repo.get().await.unwrap().len(), 4);
}
