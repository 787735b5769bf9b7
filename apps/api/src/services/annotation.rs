//! Rating and star/unstar service
//!
//! Ratings touch a single record. Star and unstar take a batch of ids and
//! apply all of them in one immediate transaction: either every id is
//! written or none is. The refresh event for a batch is published once,
//! after commit.

use std::sync::Arc;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::resolver::{probe_kind, EntityResolver};
use crate::error::{ApiError, ApiResult};
use crate::events::EventNotifier;
use crate::models::{EntityKind, RefreshEvent};
use crate::repositories::{with_tx_immediate, AnnotationStore};

/// Highest rating a user can give
pub const MAX_RATING: u8 = 5;

/// Service for user annotations
#[derive(Clone)]
pub struct AnnotationService {
    resolver: EntityResolver,
    store: Arc<dyn AnnotationStore>,
    notifier: Arc<dyn EventNotifier>,
}

impl AnnotationService {
    pub fn new(
        resolver: EntityResolver,
        store: Arc<dyn AnnotationStore>,
        notifier: Arc<dyn EventNotifier>,
    ) -> Self {
        Self {
            resolver,
            store,
            notifier,
        }
    }

    /// Set the rating of whichever record carries `id`
    ///
    /// # Errors
    /// - `ApiError::ValidationError` if `rating` exceeds [`MAX_RATING`]
    /// - `ApiError::NotFound` if no record has `id`
    #[instrument(skip(self))]
    pub async fn set_rating(&self, user_id: Uuid, id: &str, rating: u8) -> ApiResult<EntityKind> {
        if rating > MAX_RATING {
            return Err(ApiError::ValidationError(format!(
                "rating must be between 0 and {} (got {})",
                MAX_RATING, rating
            )));
        }

        let entity = self.resolver.lookup(id).await?;
        let kind = entity.kind();

        self.store.set_rating(user_id, kind, id, rating).await?;
        info!(%kind, id, rating, "Rating updated");

        self.notifier
            .publish(RefreshEvent::new().with(kind, id))
            .await;

        Ok(kind)
    }

    /// Star every id in the batch
    pub async fn star(&self, user_id: Uuid, ids: Vec<String>) -> ApiResult<RefreshEvent> {
        self.set_star(user_id, ids, true).await
    }

    /// Unstar every id in the batch
    pub async fn unstar(&self, user_id: Uuid, ids: Vec<String>) -> ApiResult<RefreshEvent> {
        self.set_star(user_id, ids, false).await
    }

    /// Set or clear the star on every id in one transaction
    ///
    /// An empty batch is a no-op and publishes nothing. On success the
    /// published event is returned.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn set_star(
        &self,
        user_id: Uuid,
        ids: Vec<String>,
        starred: bool,
    ) -> ApiResult<RefreshEvent> {
        if ids.is_empty() {
            debug!("Empty star batch, nothing to do");
            return Ok(RefreshEvent::new());
        }

        let event = with_tx_immediate(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let mut event = RefreshEvent::new();
                for id in ids {
                    let kind = probe_kind(&mut *tx, &id).await?;
                    tx.set_star(user_id, kind, &id, starred).await?;
                    event.add(kind, id);
                }
                Ok(event)
            })
        })
        .await?;

        info!(starred, resources = event.len(), "Star batch committed");
        self.notifier.publish(event.clone()).await;

        Ok(event)
    }
}
