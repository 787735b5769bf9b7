//! Play history repository
//!
//! Stores completed plays reported through scrobble submissions.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::RepoResult;
use crate::models::Submission;

/// Repository for play history writes
#[derive(Clone)]
pub struct PlayHistoryRepository {
    pool: PgPool,
}

impl PlayHistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a batch of plays for one user
    ///
    /// Returns the number of rows written.
    #[tracing::instrument(skip(self, submissions), fields(count = submissions.len()))]
    pub async fn record(&self, user_id: Uuid, submissions: &[Submission]) -> RepoResult<u64> {
        if submissions.is_empty() {
            return Ok(0);
        }

        let track_ids: Vec<String> = submissions.iter().map(|s| s.track_id.clone()).collect();
        let played_at: Vec<DateTime<Utc>> = submissions.iter().map(|s| s.timestamp).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO play_history (user_id, track_id, played_at)
            SELECT $1, track_id, played_at
            FROM UNNEST($2::text[], $3::timestamptz[]) AS t(track_id, played_at)
            "#,
        )
        .bind(user_id)
        .bind(&track_ids)
        .bind(&played_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
