mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{Article, article, base_repository};
use repocache::prelude::*;
use serde_json::{Value, json};

/// Articles of one author, optionally restricted to a status.
struct ByAuthor;

#[async_trait]
impl ReadOperation<Article> for ByAuthor {
    async fn call(&self, ctx: ReadContext<'_, Article>, args: &[Value]) -> RepositoryResult<Value> {
        let Some(author) = ctx.arg::<String>(args, 0)? else {
            return Err(RepositoryError::invalid_argument(
                ctx.repository,
                "author is required",
            ));
        };
        let mut criteria = Criteria::new().eq("author", author);
        if let Some(status) = ctx.arg::<String>(args, 1)? {
            criteria = criteria.eq("status", status);
        }

        let articles = ctx.store.list(&criteria).await?;
        Ok(serde_json::to_value(articles)?)
    }
}

#[tokio::test]
async fn test_save_many_is_all_or_nothing() {
    let repo = base_repository();
    let ghost = Article {
        id: Some(404),
        exists: true,
        ..article("ghost", "nobody", "draft", 0)
    };

    let result = repo
        .save_many(vec![
            article("a", "ann", "draft", 1),
            ghost,
            article("c", "cid", "draft", 3),
        ])
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

#[tokio::test]
async fn test_save_many_persists_in_order() {
    let repo = base_repository();

    let saved = repo
        .save_many(vec![
            article("a", "ann", "draft", 1),
            article("b", "bob", "draft", 2),
        ])
        .await
        .unwrap();

    assert_eq!(
        saved.iter().map(|a| a.id).collect::<Vec<_>>(),
        vec![Some(1), Some(2)]
    );
    assert!(saved.iter().all(|a| a.exists));
}

#[tokio::test]
async fn test_delete_many_is_all_or_nothing() {
    let repo = base_repository();
    let kept = repo.save(article("kept", "ann", "draft", 1)).await.unwrap();
    let never_saved = Article {
        id: Some(77),
        ..article("never", "ann", "draft", 2)
    };

    let result = repo.delete_many(&[kept.clone(), never_saved]).await;

    assert!(matches!(
        result,
        Err(RepositoryError::PersistenceFailure {
            action: WriteAction::Delete,
            ..
        })
    ));
    assert_eq!(repo.find(kept.id.unwrap()).await.unwrap(), Some(kept));
}

#[tokio::test]
async fn test_find_or_new_returns_independent_fresh_instances() {
    let repo = base_repository();

    let mut first = repo.find_or_new(12).await.unwrap();
    let second = repo.find_or_new(12).await.unwrap();

    assert!(!first.exists);
    assert!(first.id.is_none());
    first.title = "edited".to_string();
    assert_eq!(second, Article::default());
}

#[tokio::test]
async fn test_find_or_fail_names_repository() {
    let repo = base_repository();

    let err = repo.find_or_fail(3).await.unwrap_err();

    assert_eq!(err.to_string(), "ArticleRepository: no entity found for key 3");
}

#[tokio::test]
async fn test_find_where_returns_first_match_by_key() {
    let repo = base_repository();
    repo.save(article("a", "ann", "draft", 1)).await.unwrap();
    repo.save(article("b", "bob", "published", 2)).await.unwrap();
    repo.save(article("c", "cid", "published", 3)).await.unwrap();

    let found = repo
        .find_where(&Criteria::new().eq("status", "published"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.title, "b");

    let missing = repo
        .find_where(&Criteria::new().eq("status", "archived"))
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_create_is_save() {
    let repo = base_repository();

    let created = repo.create(article("a", "ann", "draft", 1)).await.unwrap();

    assert!(created.exists);
    assert_eq!(repo.find_or_fail(created.id.unwrap()).await.unwrap(), created);
}

#[tokio::test]
async fn test_registered_read_operation() {
    let repo = base_repository()
        .with_read_operation("get_by_author", Arc::new(ByAuthor))
        .unwrap();
    repo.save(article("a", "ann", "draft", 1)).await.unwrap();
    repo.save(article("b", "ann", "published", 2)).await.unwrap();
    repo.save(article("c", "bob", "published", 3)).await.unwrap();

    let all = repo
        .call_read("get_by_author", &[json!("ann")])
        .await
        .unwrap();
    let published = repo
        .call_read("get_by_author", &[json!("ann"), json!("published")])
        .await
        .unwrap();

    let titles = |value: Value| -> Vec<String> {
        serde_json::from_value::<Vec<Article>>(value)
            .unwrap()
            .into_iter()
            .map(|a| a.title)
            .collect()
    };
    assert_eq!(titles(all), vec!["a", "b"]);
    assert_eq!(titles(published), vec!["b"]);

    let bad = repo.call_read("get_by_author", &[json!(42)]).await;
    assert!(matches!(bad, Err(RepositoryError::InvalidArgument { .. })));
}

#[tokio::test]
async fn test_visible_fields_hide_hidden_fields() {
    #[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
    struct Account {
        id: Option<EntityId>,
        email: String,
        password_hash: String,
    }

    impl Entity for Account {
        const NAME: &'static str = "Account";
        const HIDDEN: &'static [&'static str] = &["password_hash"];

        fn key(&self) -> Option<EntityId> {
            self.id
        }
        fn set_key(&mut self, key: EntityId) {
            self.id = Some(key);
        }
        fn exists(&self) -> bool {
            self.id.is_some()
        }
        fn set_exists(&mut self, _exists: bool) {}
    }

    let repo = BaseRepository::<Account>::new(Arc::new(MemoryStore::<Account>::new())).unwrap();

    let mut fields = repo.visible_fields().await.unwrap();
    fields.sort();
    assert_eq!(fields, vec!["email", "id"]);
}
