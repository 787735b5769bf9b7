//! Business logic services for Encore
//!
//! This module contains:
//! - Entity kind resolution and the annotation (rating/star) service
//! - Scrobbling and now-playing coordination
//! - Play queue continuation backed by the similarity service
//! - Health checks

pub mod annotation;
pub mod continuation;
pub mod health;
pub mod recommender;
pub mod resolver;
pub mod scrobble;

pub use annotation::{AnnotationService, MAX_RATING};
pub use continuation::{
    ContinuationOutcome, QueueContinuationEngine, StopReason, SIMILAR_TRACKS_LIMIT,
};
pub use health::HealthService;
pub use recommender::{Recommender, SimilarityRecommender};
pub use resolver::{probe_kind, EntityResolver};
pub use scrobble::{
    build_submissions, NowPlayingEntry, NowPlayingReport, PlayHistoryScrobbler,
    ScrobbleCoordinator, ScrobbleError, Scrobbler,
};
