//! In-memory fakes of the service seams
//!
//! Every fake records the calls made against it so tests can assert on
//! what reached storage, the scrobble backend, the recommender and the
//! event bus.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use encore_api::events::EventNotifier;
use encore_api::models::{
    Album, AnnotatableEntity, Artist, EntityKind, PlayQueue, QueueField, RefreshEvent, Submission,
    Track, UserIdentity,
};
use encore_api::repositories::{
    AnnotationStore, AnnotationTx, LibraryStore, PlayQueueStore, RepoResult, RepositoryError,
};
use encore_api::services::{Recommender, ScrobbleError, Scrobbler};
use encore_recommender_client::{RecommenderError, RecommenderResult};
use uuid::Uuid;

fn injected_failure() -> RepositoryError {
    RepositoryError::Database(sqlx::Error::PoolClosed)
}

// ========== Library ==========

#[derive(Default)]
pub struct InMemoryLibrary {
    artists: Mutex<HashMap<String, Artist>>,
    albums: Mutex<HashMap<String, Album>>,
    tracks: Mutex<HashMap<String, Track>>,
    pub fail_path_lookup: AtomicBool,
    pub path_lookups: AtomicUsize,
}

impl InMemoryLibrary {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_artist(&self, artist: Artist) {
        self.artists.lock().unwrap().insert(artist.id.clone(), artist);
    }

    pub fn add_album(&self, album: Album) {
        self.albums.lock().unwrap().insert(album.id.clone(), album);
    }

    pub fn add_track(&self, track: Track) {
        self.tracks.lock().unwrap().insert(track.id.clone(), track);
    }

    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        match kind {
            EntityKind::Artist => self.artists.lock().unwrap().contains_key(id),
            EntityKind::Album => self.albums.lock().unwrap().contains_key(id),
            EntityKind::Song => self.tracks.lock().unwrap().contains_key(id),
        }
    }
}

#[async_trait]
impl LibraryStore for InMemoryLibrary {
    async fn find_entity(&self, id: &str) -> RepoResult<Option<AnnotatableEntity>> {
        if let Some(artist) = self.artists.lock().unwrap().get(id) {
            return Ok(Some(AnnotatableEntity::Artist(artist.clone())));
        }
        if let Some(album) = self.albums.lock().unwrap().get(id) {
            return Ok(Some(AnnotatableEntity::Album(album.clone())));
        }
        Ok(self
            .tracks
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .map(AnnotatableEntity::Song))
    }

    async fn get_track(&self, id: &str) -> RepoResult<Option<Track>> {
        Ok(self.tracks.lock().unwrap().get(id).cloned())
    }

    async fn find_tracks_by_paths(&self, paths: &[String]) -> RepoResult<Vec<Track>> {
        self.path_lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_path_lookup.load(Ordering::SeqCst) {
            return Err(injected_failure());
        }
        // Reverse order so callers cannot rely on storage order
        let mut found: Vec<Track> = self
            .tracks
            .lock()
            .unwrap()
            .values()
            .filter(|t| paths.contains(&t.path))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.path.cmp(&a.path));
        Ok(found)
    }
}

// ========== Annotations ==========

type AnnotationKey = (Uuid, EntityKind, String);

#[derive(Default)]
struct AnnotationData {
    ratings: HashMap<AnnotationKey, u8>,
    stars: HashMap<AnnotationKey, bool>,
}

struct AnnotationsInner {
    library: Arc<InMemoryLibrary>,
    data: Mutex<AnnotationData>,
    fail_star_on: Mutex<Option<String>>,
    fail_commit: AtomicBool,
    transactions: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    probes: Mutex<Vec<(EntityKind, String)>>,
}

/// Annotation store whose transactions stage writes until commit
#[derive(Clone)]
pub struct InMemoryAnnotations {
    inner: Arc<AnnotationsInner>,
}

impl InMemoryAnnotations {
    pub fn new(library: Arc<InMemoryLibrary>) -> Self {
        Self {
            inner: Arc::new(AnnotationsInner {
                library,
                data: Mutex::new(AnnotationData::default()),
                fail_star_on: Mutex::new(None),
                fail_commit: AtomicBool::new(false),
                transactions: AtomicUsize::new(0),
                commits: AtomicUsize::new(0),
                rollbacks: AtomicUsize::new(0),
                probes: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Make the star write for `id` fail with a database error
    pub fn fail_star_on(&self, id: &str) {
        *self.inner.fail_star_on.lock().unwrap() = Some(id.to_string());
    }

    pub fn fail_commit(&self) {
        self.inner.fail_commit.store(true, Ordering::SeqCst);
    }

    pub fn rating(&self, user_id: Uuid, kind: EntityKind, id: &str) -> Option<u8> {
        let data = self.inner.data.lock().unwrap();
        data.ratings.get(&(user_id, kind, id.to_string())).copied()
    }

    pub fn starred(&self, user_id: Uuid, kind: EntityKind, id: &str) -> Option<bool> {
        let data = self.inner.data.lock().unwrap();
        data.stars.get(&(user_id, kind, id.to_string())).copied()
    }

    pub fn star_count(&self) -> usize {
        self.inner.data.lock().unwrap().stars.len()
    }

    pub fn transactions(&self) -> usize {
        self.inner.transactions.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.inner.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.inner.rollbacks.load(Ordering::SeqCst)
    }

    /// Every existence probe made inside transactions, in order
    pub fn probes(&self) -> Vec<(EntityKind, String)> {
        self.inner.probes.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnnotationStore for InMemoryAnnotations {
    async fn set_rating(
        &self,
        user_id: Uuid,
        kind: EntityKind,
        id: &str,
        rating: u8,
    ) -> RepoResult<()> {
        if !self.inner.library.contains(kind, id) {
            return Err(RepositoryError::not_found(kind.as_str(), id));
        }
        self.inner
            .data
            .lock()
            .unwrap()
            .ratings
            .insert((user_id, kind, id.to_string()), rating);
        Ok(())
    }

    async fn begin_immediate(&self) -> RepoResult<Box<dyn AnnotationTx>> {
        self.inner.transactions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryAnnotationTx {
            inner: self.inner.clone(),
            staged: Vec::new(),
        }))
    }
}

struct InMemoryAnnotationTx {
    inner: Arc<AnnotationsInner>,
    staged: Vec<(AnnotationKey, bool)>,
}

#[async_trait]
impl AnnotationTx for InMemoryAnnotationTx {
    async fn exists(&mut self, kind: EntityKind, id: &str) -> RepoResult<bool> {
        self.inner
            .probes
            .lock()
            .unwrap()
            .push((kind, id.to_string()));
        Ok(self.inner.library.contains(kind, id))
    }

    async fn set_star(
        &mut self,
        user_id: Uuid,
        kind: EntityKind,
        id: &str,
        starred: bool,
    ) -> RepoResult<()> {
        if self.inner.fail_star_on.lock().unwrap().as_deref() == Some(id) {
            return Err(injected_failure());
        }
        if !self.inner.library.contains(kind, id) {
            return Err(RepositoryError::not_found(kind.as_str(), id));
        }
        self.staged.push(((user_id, kind, id.to_string()), starred));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> RepoResult<()> {
        if self.inner.fail_commit.load(Ordering::SeqCst) {
            return Err(injected_failure());
        }
        let mut data = self.inner.data.lock().unwrap();
        for (key, starred) in self.staged {
            data.stars.insert(key, starred);
        }
        self.inner.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> RepoResult<()> {
        self.inner.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ========== Play queues ==========

type StoreHook = Box<dyn FnOnce(&mut PlayQueue) + Send>;

/// Play queue store with version compare-and-swap
///
/// A hook registered with `before_store(n, ..)` edits the stored queue right
/// before the n-th store call (1-based) is checked, standing in for a
/// concurrent writer.
#[derive(Default)]
pub struct InMemoryQueues {
    queues: Mutex<HashMap<Uuid, PlayQueue>>,
    stores: Mutex<Vec<Vec<QueueField>>>,
    hooks: Mutex<HashMap<usize, StoreHook>>,
    pub fail_load: AtomicBool,
    pub fail_store: AtomicBool,
}

impl InMemoryQueues {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed a stored queue for `user_id`
    pub fn seed(&self, user_id: Uuid, items: Vec<Track>, current: usize) {
        let queue = PlayQueue {
            user_id,
            items,
            current,
            position_ms: 42_000,
            changed_by: "encore-web".to_string(),
            version: 1,
            updated_at: Utc::now(),
        };
        self.queues.lock().unwrap().insert(user_id, queue);
    }

    pub fn get(&self, user_id: Uuid) -> Option<PlayQueue> {
        self.queues.lock().unwrap().get(&user_id).cloned()
    }

    /// Field lists of every attempted store, in order
    pub fn stores(&self) -> Vec<Vec<QueueField>> {
        self.stores.lock().unwrap().clone()
    }

    pub fn before_store(&self, call: usize, hook: impl FnOnce(&mut PlayQueue) + Send + 'static) {
        self.hooks.lock().unwrap().insert(call, Box::new(hook));
    }
}

#[async_trait]
impl PlayQueueStore for InMemoryQueues {
    async fn retrieve_with_items(&self, user_id: Uuid) -> RepoResult<Option<PlayQueue>> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(injected_failure());
        }
        Ok(self.get(user_id))
    }

    async fn store(&self, queue: &PlayQueue, fields: &[QueueField]) -> RepoResult<i64> {
        let call = {
            let mut stores = self.stores.lock().unwrap();
            stores.push(fields.to_vec());
            stores.len()
        };
        if self.fail_store.load(Ordering::SeqCst) {
            return Err(injected_failure());
        }
        queue.validate()?;

        let hook = self.hooks.lock().unwrap().remove(&call);

        let mut queues = self.queues.lock().unwrap();
        if let Some(hook) = hook {
            if let Some(stored) = queues.get_mut(&queue.user_id) {
                hook(stored);
                stored.version += 1;
            }
        }

        let conflict = RepositoryError::Conflict {
            user_id: queue.user_id,
            expected: queue.version,
        };

        if queue.version == 0 {
            if queues.contains_key(&queue.user_id) {
                return Err(conflict);
            }
            let mut stored = queue.clone();
            stored.version = 1;
            queues.insert(queue.user_id, stored);
            return Ok(1);
        }

        let stored = queues.get_mut(&queue.user_id).ok_or(conflict)?;
        if stored.version != queue.version {
            return Err(RepositoryError::Conflict {
                user_id: queue.user_id,
                expected: queue.version,
            });
        }

        for field in fields {
            match field {
                QueueField::Current => stored.current = queue.current,
                QueueField::Position => stored.position_ms = queue.position_ms,
                QueueField::Items => stored.items = queue.items.clone(),
                QueueField::ChangedBy => stored.changed_by = queue.changed_by.clone(),
            }
        }
        stored.version += 1;
        stored.updated_at = Utc::now();
        Ok(stored.version)
    }
}

// ========== Events ==========

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<RefreshEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<RefreshEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventNotifier for RecordingNotifier {
    async fn publish(&self, event: RefreshEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// ========== Recommender ==========

/// Recommender answering from a fixed script
#[derive(Default)]
pub struct FakeRecommender {
    paths: Mutex<Vec<String>>,
    fail: AtomicBool,
    calls: Mutex<Vec<(String, u32)>>,
    /// When set, answers wait for `release`
    gate: Mutex<Option<Arc<tokio::sync::Notify>>>,
}

impl FakeRecommender {
    pub fn returning(paths: &[&str]) -> Arc<Self> {
        let fake = Self::default();
        *fake.paths.lock().unwrap() = paths.iter().map(|p| p.to_string()).collect();
        Arc::new(fake)
    }

    pub fn failing() -> Arc<Self> {
        let fake = Self::default();
        fake.fail.store(true, Ordering::SeqCst);
        Arc::new(fake)
    }

    /// Like `returning`, but every answer waits for [`FakeRecommender::release`]
    pub fn held(paths: &[&str]) -> Arc<Self> {
        let fake = Self::returning(paths);
        *fake.gate.lock().unwrap() = Some(Arc::new(tokio::sync::Notify::new()));
        fake
    }

    pub fn release(&self) {
        if let Some(gate) = self.gate.lock().unwrap().as_ref() {
            gate.notify_one();
        }
    }

    /// (track path, limit) of every call
    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Recommender for FakeRecommender {
    async fn similar_paths(&self, track: &Track, limit: u32) -> RecommenderResult<Vec<String>> {
        self.calls.lock().unwrap().push((track.path.clone(), limit));
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(RecommenderError::Status {
                status: 503,
                body: "index rebuilding".to_string(),
            });
        }
        Ok(self.paths.lock().unwrap().clone())
    }
}

// ========== Scrobbling ==========

#[derive(Debug, Clone, PartialEq)]
pub struct NowPlayingCall {
    pub user_id: Uuid,
    pub client_id: String,
    pub client: String,
    pub track_id: String,
    pub position_secs: i64,
}

#[derive(Default)]
pub struct RecordingScrobbler {
    submissions: Mutex<Vec<Vec<Submission>>>,
    now_playing: Mutex<Vec<NowPlayingCall>>,
    pub fail: AtomicBool,
}

impl RecordingScrobbler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let fake = Self::default();
        fake.fail.store(true, Ordering::SeqCst);
        Arc::new(fake)
    }

    pub fn submissions(&self) -> Vec<Vec<Submission>> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn now_playing_calls(&self) -> Vec<NowPlayingCall> {
        self.now_playing.lock().unwrap().clone()
    }

    fn outcome(&self) -> Result<(), ScrobbleError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(ScrobbleError::Backend("agent unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Scrobbler for RecordingScrobbler {
    async fn submit(
        &self,
        _user: &UserIdentity,
        submissions: &[Submission],
    ) -> Result<(), ScrobbleError> {
        self.submissions.lock().unwrap().push(submissions.to_vec());
        self.outcome()
    }

    async fn now_playing(
        &self,
        user: &UserIdentity,
        client_id: &str,
        client: &str,
        track: &Track,
        position_secs: i64,
    ) -> Result<(), ScrobbleError> {
        self.now_playing.lock().unwrap().push(NowPlayingCall {
            user_id: user.id,
            client_id: client_id.to_string(),
            client: client.to_string(),
            track_id: track.id.clone(),
            position_secs,
        });
        self.outcome()
    }
}
