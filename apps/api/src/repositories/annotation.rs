//! Annotation repository
//!
//! Ratings and stars live in a single `annotations` table keyed by
//! (user, item type, item id). Writes only succeed for records that exist
//! in the matching library table.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::traits::{AnnotationStore, AnnotationTx};
use super::utils::{table_for, ANNOTATION_WRITE_LOCK};
use super::{RepoResult, RepositoryError};
use crate::models::EntityKind;

/// Repository for annotation writes
#[derive(Clone)]
pub struct AnnotationRepository {
    pool: PgPool,
}

impl AnnotationRepository {
    /// Create a new AnnotationRepository instance
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn rating_sql(kind: EntityKind) -> String {
    format!(
        r#"
        INSERT INTO annotations (user_id, item_type, item_id, rating, updated_at)
        SELECT $1, $2, e.id, $3, NOW()
        FROM {} e
        WHERE e.id = $4
        ON CONFLICT (user_id, item_type, item_id)
        DO UPDATE SET rating = EXCLUDED.rating, updated_at = NOW()
        "#,
        table_for(kind)
    )
}

fn star_sql(kind: EntityKind) -> String {
    format!(
        r#"
        INSERT INTO annotations (user_id, item_type, item_id, starred, starred_at, updated_at)
        SELECT $1, $2, e.id, $3, CASE WHEN $3 THEN NOW() ELSE NULL END, NOW()
        FROM {} e
        WHERE e.id = $4
        ON CONFLICT (user_id, item_type, item_id)
        DO UPDATE SET
            starred = EXCLUDED.starred,
            starred_at = EXCLUDED.starred_at,
            updated_at = NOW()
        "#,
        table_for(kind)
    )
}

#[async_trait]
impl AnnotationStore for AnnotationRepository {
    #[tracing::instrument(skip(self))]
    async fn set_rating(
        &self,
        user_id: Uuid,
        kind: EntityKind,
        id: &str,
        rating: u8,
    ) -> RepoResult<()> {
        let result = sqlx::query(&rating_sql(kind))
            .bind(user_id)
            .bind(kind.as_str())
            .bind(i16::from(rating))
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found(kind.as_str(), id));
        }

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn begin_immediate(&self) -> RepoResult<Box<dyn AnnotationTx>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(ANNOTATION_WRITE_LOCK)
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(PgAnnotationTx { tx }))
    }
}

/// Postgres transaction holding the annotation write lock
pub struct PgAnnotationTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl AnnotationTx for PgAnnotationTx {
    async fn exists(&mut self, kind: EntityKind, id: &str) -> RepoResult<bool> {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)", table_for(kind));
        let exists: bool = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(exists)
    }

    async fn set_star(
        &mut self,
        user_id: Uuid,
        kind: EntityKind,
        id: &str,
        starred: bool,
    ) -> RepoResult<()> {
        let result = sqlx::query(&star_sql(kind))
            .bind(user_id)
            .bind(kind.as_str())
            .bind(starred)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found(kind.as_str(), id));
        }

        Ok(())
    }

    async fn commit(self: Box<Self>) -> RepoResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> RepoResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_sql_targets_kind_table() {
        assert!(star_sql(EntityKind::Song).contains("FROM tracks e"));
        assert!(star_sql(EntityKind::Album).contains("FROM albums e"));
        assert!(rating_sql(EntityKind::Artist).contains("FROM artists e"));
    }
}
