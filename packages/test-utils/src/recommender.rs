//! Mock similarity service for testing queue continuation
//!
//! Provides a [`MockRecommenderServer`] that simulates the
//! `POST /v1/music/similar` endpoint.

use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path of the similarity endpoint
pub const SIMILAR_PATH: &str = "/v1/music/similar";

/// Build a similarity response body whose results carry the given paths,
/// nearest first
pub fn similar_response_json(query_file: &str, paths: &[&str]) -> Value {
    let results: Vec<Value> = paths
        .iter()
        .enumerate()
        .map(|(i, file_path)| {
            json!({
                "id": format!("match-{}", i),
                "metadata": {
                    "artist": "Mock Artist",
                    "song_name": format!("Song {}", i),
                    "album_name": "Mock Album",
                    "genre": "test",
                    "file_path": file_path
                },
                "distance": 0.1 * (i as f64 + 1.0)
            })
        })
        .collect();

    json!({
        "query_file": query_file,
        "results": results,
        "count": paths.len()
    })
}

/// Mock similarity server
///
/// Wraps a [`wiremock::MockServer`] with helpers for the responses the
/// continuation engine has to cope with.
pub struct MockRecommenderServer {
    server: MockServer,
}

impl MockRecommenderServer {
    /// Start a new mock similarity server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Get the server URL
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Respond to every lookup with the given paths
    pub async fn mock_similar_paths(&self, paths: &[&str]) {
        Mock::given(method("POST"))
            .and(path(SIMILAR_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(similar_response_json("query", paths)),
            )
            .mount(&self.server)
            .await;
    }

    /// Respond with the given paths only when the query path matches
    pub async fn mock_similar_for_query(&self, query_file: &str, paths: &[&str]) {
        Mock::given(method("POST"))
            .and(path(SIMILAR_PATH))
            .and(body_partial_json(json!({ "file_path": query_file })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(similar_response_json(query_file, paths)),
            )
            .mount(&self.server)
            .await;
    }

    /// Respond with an error status and a JSON error body
    pub async fn mock_similar_failure(&self, status_code: u16, error_message: &str) {
        Mock::given(method("POST"))
            .and(path(SIMILAR_PATH))
            .respond_with(ResponseTemplate::new(status_code).set_body_json(json!({
                "detail": error_message
            })))
            .mount(&self.server)
            .await;
    }

    /// Respond with an arbitrary raw body
    pub async fn mock_similar_raw(&self, status_code: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path(SIMILAR_PATH))
            .respond_with(ResponseTemplate::new(status_code).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    /// Respond successfully, but only after `delay_ms`
    pub async fn mock_similar_delay(&self, delay_ms: u64) {
        Mock::given(method("POST"))
            .and(path(SIMILAR_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(std::time::Duration::from_millis(delay_ms))
                    .set_body_json(similar_response_json("query", &[])),
            )
            .mount(&self.server)
            .await;
    }

    /// Number of requests received on the similarity endpoint
    pub async fn similar_calls(&self) -> usize {
        self.received_bodies().await.len()
    }

    /// JSON bodies received on the similarity endpoint, in arrival order
    pub async fn received_bodies(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.url.path() == SIMILAR_PATH)
            .filter_map(|request| serde_json::from_slice(&request.body).ok())
            .collect()
    }

    /// Access the underlying wiremock server
    pub fn inner(&self) -> &MockServer {
        &self.server
    }
}
