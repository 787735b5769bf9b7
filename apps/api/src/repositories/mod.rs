//! Persistence layer for Encore
//!
//! Services talk to storage through the traits in [`traits`]; the Postgres
//! repositories in this module implement them. Keeping the seam at the
//! trait level lets the annotation and continuation logic run against
//! in-memory stores in tests.

pub mod annotation;
pub mod history;
pub mod library;
pub mod queue;
pub mod traits;
pub mod utils;

use thiserror::Error;
use uuid::Uuid;

use crate::models::QueueValidationError;

pub use annotation::AnnotationRepository;
pub use history::PlayHistoryRepository;
pub use library::LibraryRepository;
pub use queue::PlayQueueRepository;
pub use traits::{with_tx_immediate, AnnotationStore, AnnotationTx, LibraryStore, PlayQueueStore};

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepositoryError>;

/// Errors that can occur during repository operations
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("play queue of user {user_id} changed concurrently (expected version {expected})")]
    Conflict { user_id: Uuid, expected: i64 },

    #[error("validation error: {0}")]
    Validation(String),
}

impl RepositoryError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<QueueValidationError> for RepositoryError {
    fn from(err: QueueValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}
