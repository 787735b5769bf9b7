//! Storage traits consumed by the service layer

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use uuid::Uuid;

use super::RepoResult;
use crate::models::{AnnotatableEntity, EntityKind, PlayQueue, QueueField, Track};

/// Read access to library records
#[async_trait]
pub trait LibraryStore: Send + Sync {
    /// Find whichever record carries `id`, tagged with its kind
    ///
    /// Kinds are checked artist, album, then song; the first hit wins.
    async fn find_entity(&self, id: &str) -> RepoResult<Option<AnnotatableEntity>>;

    /// Get a track by ID
    async fn get_track(&self, id: &str) -> RepoResult<Option<Track>>;

    /// Tracks whose library path is one of `paths`, in no particular order
    async fn find_tracks_by_paths(&self, paths: &[String]) -> RepoResult<Vec<Track>>;
}

/// Writes to per-user annotations
#[async_trait]
pub trait AnnotationStore: Send + Sync {
    /// Set the rating of an existing record
    ///
    /// Returns `RepositoryError::NotFound` if no record of `kind` has `id`.
    async fn set_rating(
        &self,
        user_id: Uuid,
        kind: EntityKind,
        id: &str,
        rating: u8,
    ) -> RepoResult<()>;

    /// Open a transaction that claims write priority before its first
    /// statement
    async fn begin_immediate(&self) -> RepoResult<Box<dyn AnnotationTx>>;
}

/// An open annotation transaction
///
/// Dropping the handle without calling [`AnnotationTx::commit`] discards
/// every write made through it.
#[async_trait]
pub trait AnnotationTx: Send {
    /// Whether a record of `kind` with `id` exists
    async fn exists(&mut self, kind: EntityKind, id: &str) -> RepoResult<bool>;

    /// Set or clear the star on an existing record
    ///
    /// Returns `RepositoryError::NotFound` if no record of `kind` has `id`.
    async fn set_star(
        &mut self,
        user_id: Uuid,
        kind: EntityKind,
        id: &str,
        starred: bool,
    ) -> RepoResult<()>;

    async fn commit(self: Box<Self>) -> RepoResult<()>;

    async fn rollback(self: Box<Self>) -> RepoResult<()>;
}

/// Persistence of per-user play queues
#[async_trait]
pub trait PlayQueueStore: Send + Sync {
    /// Load the queue of `user_id` with all item snapshots
    async fn retrieve_with_items(&self, user_id: Uuid) -> RepoResult<Option<PlayQueue>>;

    /// Write `fields` of `queue`, returning the new version
    ///
    /// The write only happens if the stored version still equals
    /// `queue.version`; otherwise `RepositoryError::Conflict` is returned
    /// and nothing changes. A queue with version 0 is inserted in full.
    async fn store(&self, queue: &PlayQueue, fields: &[QueueField]) -> RepoResult<i64>;
}

/// Run `work` inside an immediate annotation transaction
///
/// Commits when `work` succeeds and rolls back when it fails. `work` itself
/// never commits or rolls back.
#[tracing::instrument(skip_all)]
pub async fn with_tx_immediate<T, F>(store: &dyn AnnotationStore, work: F) -> RepoResult<T>
where
    T: Send,
    F: for<'t> FnOnce(&'t mut dyn AnnotationTx) -> BoxFuture<'t, RepoResult<T>> + Send,
{
    let mut tx = store.begin_immediate().await?;

    let outcome = work(tx.as_mut()).await;
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "Annotation rollback failed");
            }
            Err(e)
        }
    }
}
