//! PostgreSQL implementation of the persistence engine.
//!
//! Entities are stored as JSONB documents in the shared `entities` table,
//! discriminated by [`Entity::NAME`]. See `migrations/` for the schema.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Row};
use tracing::debug;

use super::engine::{PersistenceEngine, StoreError, StoreResult, Write};
use crate::domain::entities::{Criteria, Entity, EntityId};
use crate::domain::pagination::{CursorPosition, SortDirection, SortSpec};
use crate::utils::db_error::is_unique_violation;

/// PostgreSQL engine for one entity type.
///
/// Exact-match criteria are evaluated with JSONB containment (`body @> ...`),
/// which the GIN index on `body` serves. Transactions run in one database
/// transaction and are rolled back on the first failing write.
pub struct PgStore<E> {
    pool: Arc<PgPool>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> PgStore<E> {
    /// Creates a new engine with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }
}

fn decode_row<E: Entity>(row: &PgRow) -> StoreResult<E> {
    let id: i64 = row.try_get("id")?;
    let Json(body): Json<Value> = row.try_get("body")?;

    let mut entity: E = serde_json::from_value(body)?;
    entity.set_key(id);
    entity.set_exists(true);

    Ok(entity)
}

fn map_write_error(e: sqlx::Error) -> StoreError {
    if is_unique_violation(&e) {
        return StoreError::Conflict(e.to_string());
    }
    StoreError::Database(e)
}

async fn insert_row<E: Entity>(conn: &mut PgConnection, mut entity: E) -> StoreResult<E> {
    let explicit = entity.key().is_some();
    let id = match entity.key() {
        Some(id) => id,
        None => {
            sqlx::query_scalar::<_, i64>("SELECT nextval('entity_id_seq')")
                .fetch_one(&mut *conn)
                .await?
        }
    };

    entity.set_key(id);
    entity.set_exists(true);
    let body = Json(serde_json::to_value(&entity)?);

    sqlx::query(
        r#"
        INSERT INTO entities (entity_type, id, body)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(E::NAME)
    .bind(id)
    .bind(body)
    .execute(&mut *conn)
    .await
    .map_err(map_write_error)?;

    if explicit {
        // Keep nextval() ahead of caller-chosen keys.
        sqlx::query(
            r#"
            SELECT setval('entity_id_seq', $1)
            WHERE $1 >= (SELECT last_value FROM entity_id_seq)
            "#,
        )
        .bind(id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(entity)
}

async fn update_row<E: Entity>(conn: &mut PgConnection, mut entity: E) -> StoreResult<E> {
    let Some(id) = entity.key() else {
        return Err(StoreError::Rejected(format!(
            "cannot update {} without a key",
            E::NAME
        )));
    };

    entity.set_exists(true);
    let body = Json(serde_json::to_value(&entity)?);

    let result = sqlx::query(
        r#"
        UPDATE entities SET body = $3, updated_at = NOW()
        WHERE entity_type = $1 AND id = $2
        "#,
    )
    .bind(E::NAME)
    .bind(id)
    .bind(body)
    .execute(&mut *conn)
    .await
    .map_err(map_write_error)?;

    if result.rows_affected() == 0 {
        return Err(StoreError::Rejected(format!(
            "no stored {} with key {}",
            E::NAME,
            id
        )));
    }

    Ok(entity)
}

async fn delete_row<E: Entity>(conn: &mut PgConnection, id: EntityId) -> StoreResult<bool> {
    let result = sqlx::query("DELETE FROM entities WHERE entity_type = $1 AND id = $2")
        .bind(E::NAME)
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// `COALESCE(body -> field, 'null')`, so documents without the field sort as `null`.
fn push_sort_expr(builder: &mut QueryBuilder<'_, Postgres>, field: &str) {
    builder.push("COALESCE(body -> ");
    builder.push_bind(field.to_string());
    builder.push("::text, 'null'::jsonb)");
}

#[async_trait]
impl<E: Entity> PersistenceEngine<E> for PgStore<E> {
    async fn find(&self, id: EntityId) -> StoreResult<Option<E>> {
        let row = sqlx::query(
            r#"
            SELECT id, body
            FROM entities
            WHERE entity_type = $1 AND id = $2
            "#,
        )
        .bind(E::NAME)
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.as_ref().map(decode_row).transpose()
    }

    async fn first_where(&self, criteria: &Criteria) -> StoreResult<Option<E>> {
        let row = sqlx::query(
            r#"
            SELECT id, body
            FROM entities
            WHERE entity_type = $1 AND body @> $2
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(E::NAME)
        .bind(Json(criteria.to_json_object()))
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.as_ref().map(decode_row).transpose()
    }

    async fn list(&self, criteria: &Criteria) -> StoreResult<Vec<E>> {
        let rows = sqlx::query(
            r#"
            SELECT id, body
            FROM entities
            WHERE entity_type = $1 AND body @> $2
            ORDER BY id
            "#,
        )
        .bind(E::NAME)
        .bind(Json(criteria.to_json_object()))
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.iter().map(decode_row).collect()
    }

    async fn page(&self, criteria: &Criteria, offset: u64, limit: u64) -> StoreResult<(Vec<E>, u64)> {
        let filter = Json(criteria.to_json_object());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM entities WHERE entity_type = $1 AND body @> $2",
        )
        .bind(E::NAME)
        .bind(&filter)
        .fetch_one(self.pool.as_ref())
        .await?;

        if limit == 0 {
            return Ok((Vec::new(), total.max(0) as u64));
        }

        let rows = sqlx::query(
            r#"
            SELECT id, body
            FROM entities
            WHERE entity_type = $1 AND body @> $2
            ORDER BY id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(E::NAME)
        .bind(&filter)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(self.pool.as_ref())
        .await?;

        let items = rows.iter().map(decode_row).collect::<StoreResult<Vec<E>>>()?;
        Ok((items, total.max(0) as u64))
    }

    async fn seek(
        &self,
        criteria: &Criteria,
        sort: &SortSpec,
        after: Option<&CursorPosition>,
        limit: u64,
    ) -> StoreResult<Vec<E>> {
        let (comparison, direction) = match sort.direction {
            SortDirection::Asc => (" > ", " ASC"),
            SortDirection::Desc => (" < ", " DESC"),
        };

        let mut builder =
            QueryBuilder::<Postgres>::new("SELECT id, body FROM entities WHERE entity_type = ");
        builder.push_bind(E::NAME);
        builder.push(" AND body @> ");
        builder.push_bind(Json(criteria.to_json_object()));

        if let Some(position) = after {
            builder.push(" AND ");
            match &sort.field {
                Some(field) => {
                    builder.push("(");
                    push_sort_expr(&mut builder, field);
                    builder.push(", id)");
                    builder.push(comparison);
                    builder.push("(");
                    builder.push_bind(Json(position.value.clone()));
                    builder.push("::jsonb, ");
                    builder.push_bind(position.key);
                    builder.push(")");
                }
                None => {
                    builder.push("id");
                    builder.push(comparison);
                    builder.push_bind(position.key);
                }
            }
        }

        builder.push(" ORDER BY ");
        if let Some(field) = &sort.field {
            push_sort_expr(&mut builder, field);
            builder.push(direction);
            builder.push(", ");
        }
        builder.push("id");
        builder.push(direction);
        builder.push(" LIMIT ");
        builder.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));

        let rows = builder.build().fetch_all(self.pool.as_ref()).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn insert(&self, entity: E) -> StoreResult<E> {
        let mut conn = self.pool.acquire().await?;
        insert_row(&mut conn, entity).await
    }

    async fn update(&self, entity: E) -> StoreResult<E> {
        let mut conn = self.pool.acquire().await?;
        update_row(&mut conn, entity).await
    }

    async fn remove(&self, id: EntityId) -> StoreResult<bool> {
        let mut conn = self.pool.acquire().await?;
        delete_row::<E>(&mut conn, id).await
    }

    async fn transaction(&self, writes: Vec<Write<E>>) -> StoreResult<Vec<E>> {
        let mut tx = self.pool.begin().await?;
        let mut persisted = Vec::with_capacity(writes.len());

        for (index, write) in writes.into_iter().enumerate() {
            let outcome = match write {
                Write::Insert(entity) => insert_row(&mut tx, entity).await.map(Some),
                Write::Update(entity) => update_row(&mut tx, entity).await.map(Some),
                Write::Delete(id) => match delete_row::<E>(&mut tx, id).await {
                    Ok(true) => Ok(None),
                    Ok(false) => Err(StoreError::Rejected(format!(
                        "no stored {} with key {}",
                        E::NAME,
                        id
                    ))),
                    Err(e) => Err(e),
                },
            };

            match outcome {
                Ok(Some(entity)) => persisted.push(entity),
                Ok(None) => {}
                Err(e) => {
                    debug!("Rolling back {} transaction at write {}: {}", E::NAME, index, e);
                    tx.rollback().await?;
                    return Err(StoreError::BatchFailed {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tx.commit().await?;
        Ok(persisted)
    }
}
