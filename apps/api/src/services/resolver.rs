//! Entity kind resolution
//!
//! Identifiers are opaque and only unique within one kind, so there are two
//! ways to find out what an id refers to:
//!
//! - [`EntityResolver::lookup`] asks the library once and gets back a
//!   record already tagged with its kind. Used for ratings.
//! - [`probe_kind`] checks albums, then artists, and otherwise assumes a
//!   song without checking. Used inside star/unstar transactions. An id
//!   that matches nothing therefore fails later in the song write, not
//!   here.

use std::sync::Arc;

use crate::models::{AnnotatableEntity, EntityKind};
use crate::repositories::{AnnotationTx, LibraryStore, RepoResult, RepositoryError};

/// Kinds checked by [`probe_kind`], in tie-break order
pub const PROBE_ORDER: [EntityKind; 2] = [EntityKind::Album, EntityKind::Artist];

/// Kind assumed when no probe matches
pub const PROBE_FALLBACK: EntityKind = EntityKind::Song;

/// Single-target entity lookup
#[derive(Clone)]
pub struct EntityResolver {
    library: Arc<dyn LibraryStore>,
}

impl EntityResolver {
    pub fn new(library: Arc<dyn LibraryStore>) -> Self {
        Self { library }
    }

    /// Find the record carrying `id`
    ///
    /// Returns `RepositoryError::NotFound` when no kind has it.
    #[tracing::instrument(skip(self))]
    pub async fn lookup(&self, id: &str) -> RepoResult<AnnotatableEntity> {
        self.library
            .find_entity(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("entity", id))
    }
}

/// Probe-based kind resolution inside an open transaction
pub async fn probe_kind(tx: &mut dyn AnnotationTx, id: &str) -> RepoResult<EntityKind> {
    for kind in PROBE_ORDER {
        if tx.exists(kind, id).await? {
            return Ok(kind);
        }
    }
    Ok(PROBE_FALLBACK)
}
