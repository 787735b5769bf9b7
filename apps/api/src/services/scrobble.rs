//! Scrobbling and now-playing notifications
//!
//! [`ScrobbleCoordinator`] validates playback reports, forwards them to a
//! [`Scrobbler`] backend and, for now-playing reports, hands the track to
//! the queue continuation engine when one is configured.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::continuation::{ContinuationOutcome, QueueContinuationEngine};
use crate::error::{ApiError, ApiResult};
use crate::models::{RequestContext, Submission, Track, UserIdentity};
use crate::repositories::{LibraryStore, PlayHistoryRepository, RepositoryError};

/// Errors reported by scrobbling
#[derive(Debug, Error)]
pub enum ScrobbleError {
    /// The request itself is malformed; nothing was sent to the backend
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The backend rejected or failed to record the report
    #[error("scrobble backend failed: {0}")]
    Backend(String),
}

/// Destination of playback reports
#[async_trait]
pub trait Scrobbler: Send + Sync {
    /// Record completed plays
    async fn submit(
        &self,
        user: &UserIdentity,
        submissions: &[Submission],
    ) -> Result<(), ScrobbleError>;

    /// Record that `track` started playing on `client_id`
    async fn now_playing(
        &self,
        user: &UserIdentity,
        client_id: &str,
        client: &str,
        track: &Track,
        position_secs: i64,
    ) -> Result<(), ScrobbleError>;
}

/// A track currently playing on some client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NowPlayingEntry {
    pub user_id: Uuid,
    pub username: String,
    pub client_id: String,
    pub client: String,
    pub track: Track,
    pub position_secs: i64,
    pub started_at: DateTime<Utc>,
}

/// In-memory now-playing registry keyed by client id
///
/// Entries expire `ttl` after they were reported.
pub struct NowPlayingRegistry {
    entries: DashMap<String, NowPlayingEntry>,
    ttl: chrono::Duration,
}

impl NowPlayingRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::weeks(52)),
        }
    }

    /// Insert or replace the entry of `entry.client_id`
    pub fn record(&self, entry: NowPlayingEntry) {
        self.entries.insert(entry.client_id.clone(), entry);
    }

    /// Unexpired entries as of `now`, most recent first
    ///
    /// Expired entries are dropped as a side effect.
    pub fn entries_at(&self, now: DateTime<Utc>) -> Vec<NowPlayingEntry> {
        self.entries.retain(|_, e| now - e.started_at < self.ttl);

        let mut live: Vec<NowPlayingEntry> =
            self.entries.iter().map(|e| e.value().clone()).collect();
        live.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        live
    }

    pub fn entries(&self) -> Vec<NowPlayingEntry> {
        self.entries_at(Utc::now())
    }
}

/// Default backend: play history in Postgres plus an in-memory
/// now-playing registry
pub struct PlayHistoryScrobbler {
    history: PlayHistoryRepository,
    now_playing: NowPlayingRegistry,
}

impl PlayHistoryScrobbler {
    pub fn new(history: PlayHistoryRepository, now_playing_ttl: Duration) -> Self {
        Self {
            history,
            now_playing: NowPlayingRegistry::new(now_playing_ttl),
        }
    }

    /// Tracks currently playing across all clients
    pub fn now_playing_entries(&self) -> Vec<NowPlayingEntry> {
        self.now_playing.entries()
    }
}

#[async_trait]
impl Scrobbler for PlayHistoryScrobbler {
    async fn submit(
        &self,
        user: &UserIdentity,
        submissions: &[Submission],
    ) -> Result<(), ScrobbleError> {
        let written = self
            .history
            .record(user.id, submissions)
            .await
            .map_err(|e| ScrobbleError::Backend(e.to_string()))?;
        debug!(user = %user.username, written, "Recorded plays");
        Ok(())
    }

    async fn now_playing(
        &self,
        user: &UserIdentity,
        client_id: &str,
        client: &str,
        track: &Track,
        position_secs: i64,
    ) -> Result<(), ScrobbleError> {
        self.now_playing.record(NowPlayingEntry {
            user_id: user.id,
            username: user.username.clone(),
            client_id: client_id.to_string(),
            client: client.to_string(),
            track: track.clone(),
            position_secs,
            started_at: Utc::now(),
        });
        Ok(())
    }
}

/// Result of a now-playing report
///
/// The backend result is kept separate so the caller sees the backend
/// error even though continuation was still launched.
#[derive(Debug)]
pub struct NowPlayingReport {
    pub backend: Result<(), ScrobbleError>,
    /// Detached continuation run, if a recommender is configured
    pub continuation: Option<JoinHandle<ContinuationOutcome>>,
}

impl NowPlayingReport {
    /// Collapse into the backend result, leaving continuation running
    pub fn into_result(self) -> ApiResult<()> {
        self.backend.map_err(ApiError::from)
    }
}

/// Pair every id with its timestamp
///
/// `times` must be empty (every submission is stamped `now`) or have one
/// entry per id.
pub fn build_submissions(
    ids: &[String],
    times: &[DateTime<Utc>],
    now: DateTime<Utc>,
) -> Result<Vec<Submission>, ScrobbleError> {
    if times.is_empty() {
        return Ok(ids.iter().map(|id| Submission::new(id.clone(), now)).collect());
    }

    if times.len() != ids.len() {
        return Err(ScrobbleError::Validation(format!(
            "wrong number of timestamps: expected {} or none, got {}",
            ids.len(),
            times.len()
        )));
    }

    Ok(ids
        .iter()
        .zip(times)
        .map(|(id, time)| Submission::new(id.clone(), *time))
        .collect())
}

/// Entry point for playback reports
#[derive(Clone)]
pub struct ScrobbleCoordinator {
    library: Arc<dyn LibraryStore>,
    scrobbler: Arc<dyn Scrobbler>,
    continuation: Option<QueueContinuationEngine>,
}

impl ScrobbleCoordinator {
    pub fn new(library: Arc<dyn LibraryStore>, scrobbler: Arc<dyn Scrobbler>) -> Self {
        Self {
            library,
            scrobbler,
            continuation: None,
        }
    }

    /// Enable queue continuation on now-playing reports
    pub fn with_continuation(mut self, engine: QueueContinuationEngine) -> Self {
        self.continuation = Some(engine);
        self
    }

    /// Submit completed plays as one backend call
    ///
    /// # Errors
    /// - `ApiError::ValidationError` if `times` is neither empty nor as long
    ///   as `ids`; the backend is not called
    /// - `ApiError::Scrobble` if the backend fails
    #[instrument(skip(self, ctx, times), fields(user = %ctx.user.username, count = ids.len()))]
    pub async fn submit(
        &self,
        ctx: &RequestContext,
        ids: &[String],
        times: &[DateTime<Utc>],
    ) -> ApiResult<Vec<Submission>> {
        let submissions = build_submissions(ids, times, Utc::now())?;
        if submissions.is_empty() {
            return Ok(submissions);
        }

        self.scrobbler.submit(&ctx.user, &submissions).await?;
        Ok(submissions)
    }

    /// Report `track_id` as now playing and maybe continue the queue
    ///
    /// # Errors
    /// Returns `ApiError::NotFound` if the track does not exist. Backend
    /// failures are reported in [`NowPlayingReport::backend`].
    #[instrument(skip(self, ctx), fields(user = %ctx.user.username, player = %ctx.player.name))]
    pub async fn now_playing(
        &self,
        ctx: &RequestContext,
        track_id: &str,
        position_secs: i64,
    ) -> ApiResult<NowPlayingReport> {
        let track = self
            .library
            .get_track(track_id)
            .await?
            .ok_or_else(|| ApiError::not_found("song", track_id))?;

        let client_id = ctx.client_id();
        info!(
            title = %track.title,
            artist = track.artist.as_deref().unwrap_or_default(),
            client_id,
            position_secs,
            "Now playing"
        );

        let backend = self
            .scrobbler
            .now_playing(&ctx.user, client_id, &ctx.client, &track, position_secs)
            .await;
        if let Err(e) = &backend {
            warn!(error = %e, "Scrobble backend rejected now playing");
        }

        let continuation = match &self.continuation {
            Some(engine) => Some(engine.spawn(ctx.user.id, track)),
            None => {
                debug!("Recommender not configured, skipping queue continuation");
                None
            }
        };

        Ok(NowPlayingReport {
            backend,
            continuation,
        })
    }
}
