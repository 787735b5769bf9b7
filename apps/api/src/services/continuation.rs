//! Play queue continuation
//!
//! When a user reports a track as now playing, the engine moves the queue's
//! current pointer to that track and, if it is the last item, appends tracks
//! the similarity service considers close to it.
//!
//! ```text
//! load ─▶ locate ─▶ store current ─▶ at end? ─▶ fetch ─▶ resolve ─▶ store items ─▶ notify
//!                                       │          │         │            │
//!                                       └──────────┴─────────┴────────────┴──▶ stop
//! ```
//!
//! Runs are detached from the request that triggered them and never report
//! errors to anyone; every failure ends the run with a log line and a
//! [`StopReason`]. Runs for the same user are serialized, and every store is
//! a compare-and-swap on the queue version, so a queue edited concurrently
//! is reloaded rather than overwritten.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use super::recommender::Recommender;
use crate::events::EventNotifier;
use crate::models::{PlayQueue, QueueField, RefreshEvent, ResourceKind, Track, CHANGED_BY_AUTO};
use crate::repositories::{LibraryStore, PlayQueueStore, RepoResult};

/// Number of similar tracks requested per continuation
pub const SIMILAR_TRACKS_LIMIT: u32 = 20;

/// Store attempts before a run gives up on a contended queue
const MAX_STORE_ATTEMPTS: usize = 3;

/// Why a continuation run ended without extending the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The queue could not be loaded
    LoadFailed,
    /// The current pointer could not be stored
    PositionStoreFailed,
    /// The played track is not the last item
    NotAtEnd,
    /// The similarity service failed
    RecommenderFailed,
    /// The similarity service returned nothing
    NoCandidates,
    /// Candidate paths could not be looked up
    ResolveFailed,
    /// No candidate path matched a library track
    NoneResolved,
    /// The queue changed underneath the run and is no longer at its end
    QueueChanged,
    /// The extended queue could not be stored
    ExtendStoreFailed,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoadFailed => "load_failed",
            Self::PositionStoreFailed => "position_store_failed",
            Self::NotAtEnd => "not_at_end",
            Self::RecommenderFailed => "recommender_failed",
            Self::NoCandidates => "no_candidates",
            Self::ResolveFailed => "resolve_failed",
            Self::NoneResolved => "none_resolved",
            Self::QueueChanged => "queue_changed",
            Self::ExtendStoreFailed => "extend_store_failed",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of a continuation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuationOutcome {
    /// `added` tracks were appended and a refresh event was published
    Extended { added: usize },
    Stopped(StopReason),
}

/// Queue continuation engine
#[derive(Clone)]
pub struct QueueContinuationEngine {
    queues: Arc<dyn PlayQueueStore>,
    library: Arc<dyn LibraryStore>,
    recommender: Arc<dyn Recommender>,
    notifier: Arc<dyn EventNotifier>,
    limit: u32,
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl QueueContinuationEngine {
    pub fn new(
        queues: Arc<dyn PlayQueueStore>,
        library: Arc<dyn LibraryStore>,
        recommender: Arc<dyn Recommender>,
        notifier: Arc<dyn EventNotifier>,
    ) -> Self {
        Self {
            queues,
            library,
            recommender,
            notifier,
            limit: SIMILAR_TRACKS_LIMIT,
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Override the number of similar tracks requested
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Run continuation on its own task
    ///
    /// The task owns everything it needs; dropping the handle does not
    /// cancel it.
    pub fn spawn(&self, user_id: Uuid, track: Track) -> JoinHandle<ContinuationOutcome> {
        let engine = self.clone();
        let span = tracing::info_span!("queue_continuation", %user_id, track_id = %track.id);
        tokio::spawn(async move { engine.run(user_id, track).await }.instrument(span))
    }

    /// Evaluate and, if the queue is exhausted, extend the queue of `user_id`
    /// after `track` started playing
    pub async fn run(&self, user_id: Uuid, track: Track) -> ContinuationOutcome {
        let lock = self.user_lock(user_id);
        let outcome = {
            let _guard = lock.lock().await;
            self.run_exclusive(user_id, &track).await
        };
        drop(lock);
        self.locks
            .remove_if(&user_id, |_, lock| Arc::strong_count(lock) == 1);

        match outcome {
            ContinuationOutcome::Extended { added } => {
                info!(%user_id, added, track_title = %track.title, "Added similar tracks to play queue");
            }
            ContinuationOutcome::Stopped(reason) => {
                debug!(%user_id, %reason, "Queue continuation stopped");
            }
        }

        outcome
    }

    fn user_lock(&self, user_id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn run_exclusive(&self, user_id: Uuid, track: &Track) -> ContinuationOutcome {
        let queue = match self.update_current(user_id, track).await {
            Ok(queue) => queue,
            Err(reason) => return ContinuationOutcome::Stopped(reason),
        };

        if !queue.is_at_end() {
            debug!(
                current = queue.current,
                len = queue.len(),
                "Current item is not the last one, skipping continuation"
            );
            return ContinuationOutcome::Stopped(StopReason::NotAtEnd);
        }

        let paths = match self.recommender.similar_paths(track, self.limit).await {
            Ok(paths) => paths,
            Err(e) => {
                error!(error = %e, track_id = %track.id, "Failed to get similar tracks");
                return ContinuationOutcome::Stopped(StopReason::RecommenderFailed);
            }
        };

        if paths.is_empty() {
            warn!(track_id = %track.id, "No similar tracks found");
            return ContinuationOutcome::Stopped(StopReason::NoCandidates);
        }

        let candidates = match self.resolve_candidates(&paths).await {
            Ok(candidates) => candidates,
            Err(e) => {
                error!(error = %e, "Failed to look up similar tracks in the library");
                return ContinuationOutcome::Stopped(StopReason::ResolveFailed);
            }
        };

        if candidates.is_empty() {
            warn!(
                returned = paths.len(),
                "None of the similar tracks are in the library"
            );
            return ContinuationOutcome::Stopped(StopReason::NoneResolved);
        }

        let added = candidates.len();
        if let Err(reason) = self.extend(queue, track, candidates).await {
            return ContinuationOutcome::Stopped(reason);
        }

        self.notifier
            .publish(RefreshEvent::new().with(ResourceKind::PlayQueue, user_id.to_string()))
            .await;

        ContinuationOutcome::Extended { added }
    }

    /// Load the queue (or start one), point it at `track` and store the
    /// pointer
    ///
    /// A queue that does not contain `track` is replaced by a queue holding
    /// only `track`; in that case the items are stored along with the
    /// pointer so the two never disagree.
    async fn update_current(&self, user_id: Uuid, track: &Track) -> Result<PlayQueue, StopReason> {
        for attempt in 1..=MAX_STORE_ATTEMPTS {
            let mut queue = match self.queues.retrieve_with_items(user_id).await {
                Ok(Some(queue)) => queue,
                Ok(None) => {
                    debug!("No play queue yet, starting one");
                    PlayQueue::new_with(user_id, track.clone(), "")
                }
                Err(e) => {
                    error!(error = %e, "Failed to retrieve play queue");
                    return Err(StopReason::LoadFailed);
                }
            };

            let mut fields = vec![QueueField::Current];
            match queue.locate(&track.id) {
                Some(index) => queue.current = index,
                None => {
                    info!(
                        track_id = %track.id,
                        dropped = queue.len(),
                        "Track not in play queue, replacing queue with it"
                    );
                    queue.replace_with(track.clone());
                    fields.extend([QueueField::Items, QueueField::Position]);
                }
            }

            match self.queues.store(&queue, &fields).await {
                Ok(version) => {
                    queue.version = version;
                    info!(current = queue.current, "Updated play queue current item");
                    return Ok(queue);
                }
                Err(e) if e.is_conflict() && attempt < MAX_STORE_ATTEMPTS => {
                    debug!(attempt, "Play queue changed while updating current item, retrying");
                }
                Err(e) => {
                    error!(error = %e, "Failed to update play queue current item");
                    return Err(StopReason::PositionStoreFailed);
                }
            }
        }

        Err(StopReason::PositionStoreFailed)
    }

    /// Library tracks for `paths`, in the order of `paths`
    ///
    /// Paths without a library track are dropped.
    async fn resolve_candidates(&self, paths: &[String]) -> RepoResult<Vec<Track>> {
        let found = self.library.find_tracks_by_paths(paths).await?;
        let mut by_path: HashMap<String, Track> =
            found.into_iter().map(|t| (t.path.clone(), t)).collect();

        let resolved: Vec<Track> = paths.iter().filter_map(|p| by_path.remove(p)).collect();
        if resolved.len() < paths.len() {
            debug!(
                dropped = paths.len() - resolved.len(),
                "Dropped similar tracks missing from the library"
            );
        }

        Ok(resolved)
    }

    /// Append `candidates` and store items and pointer together
    ///
    /// On a version conflict the queue is reloaded and the candidates are
    /// appended again, as long as `track` is still the last item.
    async fn extend(
        &self,
        mut queue: PlayQueue,
        track: &Track,
        candidates: Vec<Track>,
    ) -> Result<PlayQueue, StopReason> {
        let user_id = queue.user_id;

        for attempt in 1..=MAX_STORE_ATTEMPTS {
            queue.append(candidates.iter().cloned());
            queue.changed_by = CHANGED_BY_AUTO.to_string();

            let fields = [QueueField::Items, QueueField::Current, QueueField::ChangedBy];
            match self.queues.store(&queue, &fields).await {
                Ok(version) => {
                    queue.version = version;
                    return Ok(queue);
                }
                Err(e) if e.is_conflict() && attempt < MAX_STORE_ATTEMPTS => {
                    debug!(attempt, "Play queue changed before extension, reloading");
                }
                Err(e) => {
                    error!(error = %e, "Failed to store extended play queue");
                    return Err(StopReason::ExtendStoreFailed);
                }
            }

            queue = match self.queues.retrieve_with_items(user_id).await {
                Ok(Some(queue)) => queue,
                Ok(None) => {
                    info!("Play queue was removed, abandoning continuation");
                    return Err(StopReason::QueueChanged);
                }
                Err(e) => {
                    error!(error = %e, "Failed to reload play queue");
                    return Err(StopReason::ExtendStoreFailed);
                }
            };

            if queue.items.last().map(|t| t.id.as_str()) != Some(track.id.as_str()) {
                info!("Play queue no longer ends with the playing track, abandoning continuation");
                return Err(StopReason::QueueChanged);
            }
            queue.current = queue.len() - 1;
        }

        Err(StopReason::ExtendStoreFailed)
    }
}
