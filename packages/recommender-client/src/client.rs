//! Similarity service client implementation

use std::fmt;
use std::time::Duration;

use encore_shared_config::{RecommenderConfig, MAX_TOP_K};
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use crate::error::{RecommenderError, RecommenderResult};
use crate::models::{SimilarRequest, SimilarResponse};

/// Default connection timeout in seconds
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Longest error body kept in `RecommenderError::Status`
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Similarity service client
///
/// Requests are never retried; the configured timeout bounds every call.
#[derive(Clone)]
pub struct RecommenderClient {
    http_client: Client,
    similar_url: String,
    timeout: Duration,
}

impl fmt::Debug for RecommenderClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecommenderClient")
            .field("similar_url", &self.similar_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RecommenderClient {
    /// Create a client from the recommender configuration
    ///
    /// # Errors
    /// Returns `RecommenderError::Http` if the HTTP client cannot be built
    pub fn new(config: &RecommenderConfig) -> RecommenderResult<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http_client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS).min(timeout))
            .user_agent("Encore/0.1")
            .build()?;

        Ok(Self {
            http_client,
            similar_url: config.similar_url(),
            timeout,
        })
    }

    /// Validate the query path
    fn validate_file_path(file_path: &str) -> RecommenderResult<&str> {
        let trimmed = file_path.trim();
        if trimmed.is_empty() {
            return Err(RecommenderError::InvalidInput(
                "file path cannot be empty".to_string(),
            ));
        }
        Ok(trimmed)
    }

    /// Query the similarity service for tracks close to `file_path`
    ///
    /// # Errors
    /// - `RecommenderError::InvalidInput` - empty path or `top_k` out of range
    /// - `RecommenderError::Timeout` - the configured timeout elapsed
    /// - `RecommenderError::Status` - any status other than 200
    /// - `RecommenderError::Parse` - the body is not a similarity payload
    /// - `RecommenderError::Http` - transport failure
    #[instrument(skip(self))]
    pub async fn find_similar(
        &self,
        file_path: &str,
        top_k: u32,
    ) -> RecommenderResult<SimilarResponse> {
        let file_path = Self::validate_file_path(file_path)?;
        if top_k == 0 || top_k > MAX_TOP_K {
            return Err(RecommenderError::InvalidInput(format!(
                "top_k must be between 1 and {} (got {})",
                MAX_TOP_K, top_k
            )));
        }

        let request = SimilarRequest {
            file_path: file_path.to_string(),
            top_k,
        };

        debug!(url = %self.similar_url, top_k, "Requesting similar tracks");

        let response = self
            .http_client
            .post(&self.similar_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RecommenderError::Timeout
                } else {
                    RecommenderError::Http(e)
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                RecommenderError::Timeout
            } else {
                RecommenderError::Http(e)
            }
        })?;

        if status != StatusCode::OK {
            return Err(RecommenderError::Status {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let parsed: SimilarResponse = serde_json::from_str(&text)?;

        debug!(result_count = parsed.results.len(), "Received similar tracks");

        Ok(parsed)
    }

    /// Paths of tracks similar to `file_path`, nearest first
    pub async fn similar_paths(&self, file_path: &str, top_k: u32) -> RecommenderResult<Vec<String>> {
        Ok(self.find_similar(file_path, top_k).await?.file_paths())
    }
}
