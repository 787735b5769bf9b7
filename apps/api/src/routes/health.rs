//! `/health` probes
//!
//! `/` and `/live` answer without touching any dependency. `/ready` runs
//! every check and returns 503 when a required one fails.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};

use crate::services::HealthService;

#[derive(Clone)]
pub struct HealthState {
    service: Arc<HealthService>,
}

impl HealthState {
    pub fn new(service: HealthService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/", get(|| async { "OK" }))
        .route("/live", get(live))
        .route("/ready", get(ready))
        .with_state(state)
}

async fn live() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn ready(State(state): State<HealthState>) -> impl IntoResponse {
    let report = state.service.check_all().await;
    let status = match report.is_healthy() {
        true => StatusCode::OK,
        false => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_live_reports_version() {
        let Json(body) = live().await;
        assert_eq!(body["status"], "alive");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }
}
