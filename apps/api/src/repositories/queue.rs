//! Play queue repository
//!
//! Queue metadata lives in `play_queues`, item snapshots in
//! `play_queue_items`. Every write is a compare-and-swap on
//! `play_queues.version`, so a writer holding a stale copy gets a
//! `RepositoryError::Conflict` instead of clobbering newer state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::traits::PlayQueueStore;
use super::{RepoResult, RepositoryError};
use crate::models::{PlayQueue, QueueField, Track};

/// Row of the play_queues table
#[derive(Debug, FromRow)]
struct PlayQueueRow {
    user_id: Uuid,
    current_index: i32,
    position_ms: i64,
    changed_by: String,
    version: i64,
    updated_at: DateTime<Utc>,
}

/// Repository for play queue persistence
#[derive(Clone)]
pub struct PlayQueueRepository {
    pool: PgPool,
}

impl PlayQueueRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a never-stored queue with all of its items
    async fn insert(&self, queue: &PlayQueue) -> RepoResult<i64> {
        let mut tx = self.pool.begin().await?;

        let inserted: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO play_queues (user_id, current_index, position_ms, changed_by, version, updated_at)
            VALUES ($1, $2, $3, $4, 1, NOW())
            ON CONFLICT (user_id) DO NOTHING
            RETURNING version
            "#,
        )
        .bind(queue.user_id)
        .bind(index_to_db(queue.current)?)
        .bind(queue.position_ms)
        .bind(&queue.changed_by)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(version) = inserted else {
            return Err(RepositoryError::Conflict {
                user_id: queue.user_id,
                expected: queue.version,
            });
        };

        replace_items(&mut tx, queue.user_id, &queue.items).await?;
        tx.commit().await?;

        Ok(version)
    }

    /// Update selected fields of a stored queue if its version still matches
    async fn update(&self, queue: &PlayQueue, fields: &[QueueField]) -> RepoResult<i64> {
        let has = |field: QueueField| fields.contains(&field);

        let mut tx = self.pool.begin().await?;

        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE play_queues SET
                current_index = CASE WHEN $3 THEN $4 ELSE current_index END,
                position_ms = CASE WHEN $5 THEN $6 ELSE position_ms END,
                changed_by = CASE WHEN $7 THEN $8 ELSE changed_by END,
                version = version + 1,
                updated_at = NOW()
            WHERE user_id = $1 AND version = $2
            RETURNING version
            "#,
        )
        .bind(queue.user_id)
        .bind(queue.version)
        .bind(has(QueueField::Current))
        .bind(index_to_db(queue.current)?)
        .bind(has(QueueField::Position))
        .bind(queue.position_ms)
        .bind(has(QueueField::ChangedBy))
        .bind(&queue.changed_by)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(version) = updated else {
            return Err(RepositoryError::Conflict {
                user_id: queue.user_id,
                expected: queue.version,
            });
        };

        if has(QueueField::Items) {
            replace_items(&mut tx, queue.user_id, &queue.items).await?;
        }

        tx.commit().await?;

        Ok(version)
    }
}

fn index_to_db(index: usize) -> RepoResult<i32> {
    i32::try_from(index)
        .map_err(|_| RepositoryError::Validation(format!("queue index {} is too large", index)))
}

/// Replace every item of a user's queue inside `tx`
async fn replace_items(
    tx: &mut Transaction<'static, Postgres>,
    user_id: Uuid,
    items: &[Track],
) -> RepoResult<()> {
    sqlx::query("DELETE FROM play_queue_items WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    if items.is_empty() {
        return Ok(());
    }

    let positions: Vec<i32> = (0..items.len())
        .map(index_to_db)
        .collect::<RepoResult<_>>()?;
    let track_ids: Vec<String> = items.iter().map(|t| t.id.clone()).collect();
    let snapshots: Vec<Json<Track>> = items.iter().cloned().map(Json).collect();

    sqlx::query(
        r#"
        INSERT INTO play_queue_items (user_id, position, track_id, snapshot)
        SELECT $1, position, track_id, snapshot
        FROM UNNEST($2::int[], $3::text[], $4::jsonb[]) AS t(position, track_id, snapshot)
        "#,
    )
    .bind(user_id)
    .bind(&positions)
    .bind(&track_ids)
    .bind(&snapshots)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[async_trait]
impl PlayQueueStore for PlayQueueRepository {
    #[tracing::instrument(skip(self))]
    async fn retrieve_with_items(&self, user_id: Uuid) -> RepoResult<Option<PlayQueue>> {
        let row = sqlx::query_as::<_, PlayQueueRow>(
            r#"
            SELECT user_id, current_index, position_ms, changed_by, version, updated_at
            FROM play_queues
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items: Vec<Json<Track>> = sqlx::query_scalar(
            r#"
            SELECT snapshot
            FROM play_queue_items
            WHERE user_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(PlayQueue {
            user_id: row.user_id,
            items: items.into_iter().map(|Json(track)| track).collect(),
            current: usize::try_from(row.current_index).unwrap_or(0),
            position_ms: row.position_ms,
            changed_by: row.changed_by,
            version: row.version,
            updated_at: row.updated_at,
        }))
    }

    #[tracing::instrument(
        skip(self, queue),
        fields(user_id = %queue.user_id, version = queue.version, item_count = queue.items.len())
    )]
    async fn store(&self, queue: &PlayQueue, fields: &[QueueField]) -> RepoResult<i64> {
        queue.validate()?;

        if queue.is_stored() {
            self.update(queue, fields).await
        } else {
            self.insert(queue).await
        }
    }
}
