//! Library repository
//!
//! Read-only lookups over artists, albums and tracks.

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::LibraryStore;
use super::utils::TRACK_COLUMNS;
use super::RepoResult;
use crate::models::{Album, AnnotatableEntity, Artist, EntityKind, Track};

/// Repository for library lookups
#[derive(Clone)]
pub struct LibraryRepository {
    pool: PgPool,
}

impl LibraryRepository {
    /// Create a new LibraryRepository instance
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Which kind of record carries `id`, in artist, album, song order
    async fn kind_of(&self, id: &str) -> RepoResult<Option<EntityKind>> {
        let kind: Option<String> = sqlx::query_scalar(
            r#"
            SELECT kind FROM (
                SELECT 'artist' AS kind, 0 AS priority FROM artists WHERE id = $1
                UNION ALL
                SELECT 'album', 1 FROM albums WHERE id = $1
                UNION ALL
                SELECT 'song', 2 FROM tracks WHERE id = $1
            ) hits
            ORDER BY priority
            LIMIT 1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(kind.and_then(|k| match k.as_str() {
            "artist" => Some(EntityKind::Artist),
            "album" => Some(EntityKind::Album),
            "song" => Some(EntityKind::Song),
            _ => None,
        }))
    }
}

#[async_trait]
impl LibraryStore for LibraryRepository {
    #[tracing::instrument(skip(self))]
    async fn find_entity(&self, id: &str) -> RepoResult<Option<AnnotatableEntity>> {
        let Some(kind) = self.kind_of(id).await? else {
            return Ok(None);
        };

        let entity = match kind {
            EntityKind::Artist => {
                sqlx::query_as::<_, Artist>("SELECT id, name FROM artists WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
                    .map(AnnotatableEntity::Artist)
            }
            EntityKind::Album => {
                sqlx::query_as::<_, Album>("SELECT id, name, artist_id FROM albums WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
                    .map(AnnotatableEntity::Album)
            }
            EntityKind::Song => self.get_track(id).await?.map(AnnotatableEntity::Song),
        };

        Ok(entity)
    }

    #[tracing::instrument(skip(self))]
    async fn get_track(&self, id: &str) -> RepoResult<Option<Track>> {
        let sql = format!("SELECT {} FROM tracks WHERE id = $1", TRACK_COLUMNS);
        let track = sqlx::query_as::<_, Track>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(track)
    }

    #[tracing::instrument(skip(self, paths), fields(path_count = paths.len()))]
    async fn find_tracks_by_paths(&self, paths: &[String]) -> RepoResult<Vec<Track>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!("SELECT {} FROM tracks WHERE path = ANY($1)", TRACK_COLUMNS);
        let tracks = sqlx::query_as::<_, Track>(&sql)
            .bind(paths)
            .fetch_all(&self.pool)
            .await?;

        Ok(tracks)
    }
}
