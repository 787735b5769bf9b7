//! Rating and star/unstar route handlers
//!
//! - `POST /annotations/rating` - `{id, rating}`
//! - `POST /annotations/star` - `{ids?, album_ids?, artist_ids?}`
//! - `POST /annotations/unstar` - same body as star

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::models::{EntityKind, RefreshEvent, RequestContext};
use crate::services::{AnnotationService, MAX_RATING};

/// Shared application state for annotation handlers
#[derive(Clone)]
pub struct AnnotationState {
    pub service: AnnotationService,
}

impl AnnotationState {
    pub fn new(service: AnnotationService) -> Self {
        Self { service }
    }
}

/// Create annotation router
pub fn annotation_router(state: AnnotationState) -> Router {
    Router::new()
        .route("/rating", post(set_rating))
        .route("/star", post(star))
        .route("/unstar", post(unstar))
        .with_state(state)
}

// ========== Request/Response Types ==========

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    pub id: String,
    /// Signed so that out-of-range values are a validation error rather
    /// than a body rejection
    pub rating: i64,
}

#[derive(Debug, Serialize)]
pub struct RatingResponse {
    pub id: String,
    pub kind: EntityKind,
    pub rating: u8,
}

/// Star/unstar body; the three lists are applied as one batch
#[derive(Debug, Default, Deserialize)]
pub struct StarRequest {
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub album_ids: Vec<String>,
    #[serde(default)]
    pub artist_ids: Vec<String>,
}

impl StarRequest {
    /// Every id in request order: `ids`, then albums, then artists
    pub fn into_ids(self) -> Vec<String> {
        let mut ids = self.ids;
        ids.extend(self.album_ids);
        ids.extend(self.artist_ids);
        ids
    }
}

#[derive(Debug, Serialize)]
pub struct StarResponse {
    pub starred: bool,
    #[serde(flatten)]
    pub event: RefreshEvent,
}

// ========== Handlers ==========

async fn set_rating(
    State(state): State<AnnotationState>,
    ctx: RequestContext,
    Json(req): Json<RatingRequest>,
) -> ApiResult<Json<RatingResponse>> {
    if req.id.is_empty() {
        return Err(ApiError::MissingField("id"));
    }
    let rating = u8::try_from(req.rating).map_err(|_| {
        ApiError::ValidationError(format!(
            "rating must be between 0 and {} (got {})",
            MAX_RATING, req.rating
        ))
    })?;

    let kind = state.service.set_rating(ctx.user.id, &req.id, rating).await?;

    Ok(Json(RatingResponse {
        id: req.id,
        kind,
        rating,
    }))
}

async fn star(
    State(state): State<AnnotationState>,
    ctx: RequestContext,
    Json(req): Json<StarRequest>,
) -> ApiResult<Json<StarResponse>> {
    set_star(&state, &ctx, req, true).await
}

async fn unstar(
    State(state): State<AnnotationState>,
    ctx: RequestContext,
    Json(req): Json<StarRequest>,
) -> ApiResult<Json<StarResponse>> {
    set_star(&state, &ctx, req, false).await
}

async fn set_star(
    state: &AnnotationState,
    ctx: &RequestContext,
    req: StarRequest,
    starred: bool,
) -> ApiResult<Json<StarResponse>> {
    let ids = req.into_ids();
    if ids.is_empty() {
        return Err(ApiError::MissingField("id"));
    }

    let event = state.service.set_star(ctx.user.id, ids, starred).await?;
    Ok(Json(StarResponse { starred, event }))
}
