//! HTTP route handlers for the Encore API
//!
//! - Annotation endpoints (rating, star, unstar)
//! - Scrobble and now-playing endpoint
//! - Health check and status endpoints

pub mod annotations;
pub mod health;
pub mod scrobble;

use axum::Router;

pub use annotations::{annotation_router, AnnotationState};
pub use health::{health_router, HealthState};
pub use scrobble::{scrobble_router, ScrobbleState};

/// Every route of the API, without transport layers
pub fn app_router(
    annotations: AnnotationState,
    scrobble: ScrobbleState,
    health: HealthState,
) -> Router {
    Router::new()
        .nest("/annotations", annotation_router(annotations))
        .nest("/scrobble", scrobble_router(scrobble))
        .nest("/health", health_router(health))
}
