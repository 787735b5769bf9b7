//! Scrobble route handler
//!
//! `POST /scrobble` - `{ids, times?, submission = true, position = 0}`
//!
//! `times` are epoch milliseconds. With `submission = false` only `ids[0]`
//! is reported as now playing. Scrobble backend failures are logged and do
//! not fail the request; malformed requests do.

use axum::{extract::State, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::models::RequestContext;
use crate::services::{build_submissions, ScrobbleCoordinator};

/// Shared application state for scrobble handlers
#[derive(Clone)]
pub struct ScrobbleState {
    pub coordinator: ScrobbleCoordinator,
}

impl ScrobbleState {
    pub fn new(coordinator: ScrobbleCoordinator) -> Self {
        Self { coordinator }
    }
}

/// Create scrobble router
pub fn scrobble_router(state: ScrobbleState) -> Router {
    Router::new().route("/", post(scrobble)).with_state(state)
}

fn default_submission() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ScrobbleRequest {
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub times: Vec<i64>,
    #[serde(default = "default_submission")]
    pub submission: bool,
    /// Playback position in seconds, for now-playing reports
    #[serde(default)]
    pub position: i64,
}

#[derive(Debug, Serialize)]
pub struct ScrobbleResponse {
    /// Plays accepted for submission
    pub submitted: usize,
    pub now_playing: bool,
}

/// Convert epoch milliseconds, rejecting values chrono cannot represent
fn parse_times(times: &[i64]) -> ApiResult<Vec<DateTime<Utc>>> {
    times
        .iter()
        .map(|&ms| {
            DateTime::from_timestamp_millis(ms)
                .ok_or_else(|| ApiError::ValidationError(format!("invalid timestamp: {}", ms)))
        })
        .collect()
}

/// Keep backend failures out of the response
fn tolerate_backend<T>(result: ApiResult<T>, fallback: T) -> ApiResult<T> {
    match result {
        Err(ApiError::Scrobble(e)) => {
            warn!(error = %e, "Scrobble backend failed, request still accepted");
            Ok(fallback)
        }
        other => other,
    }
}

async fn scrobble(
    State(state): State<ScrobbleState>,
    ctx: RequestContext,
    Json(req): Json<ScrobbleRequest>,
) -> ApiResult<Json<ScrobbleResponse>> {
    let Some(first) = req.ids.first() else {
        return Err(ApiError::MissingField("id"));
    };

    let times = parse_times(&req.times)?;
    // Timestamp count is checked for both kinds of report
    build_submissions(&req.ids, &times, Utc::now())?;

    if !req.submission {
        let report = state
            .coordinator
            .now_playing(&ctx, first, req.position)
            .await?;
        tolerate_backend(report.into_result(), ())?;

        return Ok(Json(ScrobbleResponse {
            submitted: 0,
            now_playing: true,
        }));
    }

    let submitted = tolerate_backend(
        state
            .coordinator
            .submit(&ctx, &req.ids, &times)
            .await
            .map(|subs| subs.len()),
        req.ids.len(),
    )?;

    Ok(Json(ScrobbleResponse {
        submitted,
        now_playing: false,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tracing_test::traced_test;

    #[test]
    fn test_request_defaults() {
        let req: ScrobbleRequest = serde_json::from_str(r#"{"ids": ["s1"]}"#).unwrap();
        assert!(req.submission);
        assert_eq!(req.position, 0);
        assert!(req.times.is_empty());
    }

    #[test]
    fn test_parse_times_millis() {
        let times = tokio_test::assert_ok!(parse_times(&[1_700_000_000_123]));
        assert_eq!(times[0].timestamp_millis(), 1_700_000_000_123);
    }

    #[test]
    fn test_parse_times_out_of_range() {
        assert_matches!(parse_times(&[i64::MAX]), Err(ApiError::ValidationError(_)));
    }

    #[test]
    fn test_tolerate_backend_only_swallows_scrobble_errors() {
        assert_matches!(
            tolerate_backend::<usize>(Err(ApiError::Scrobble("down".into())), 3),
            Ok(3)
        );
        assert_matches!(
            tolerate_backend::<usize>(Err(ApiError::ValidationError("bad".into())), 3),
            Err(ApiError::ValidationError(_))
        );
    }

    #[test]
    #[traced_test]
    fn test_swallowed_backend_error_is_logged() {
        let result = tolerate_backend(Err(ApiError::Scrobble("connection reset".into())), ());
        assert!(result.is_ok());
        assert!(logs_contain("Scrobble backend failed"));
        assert!(logs_contain("connection reset"));
    }
}
