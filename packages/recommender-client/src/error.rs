//! Similarity service error types

use thiserror::Error;

/// Similarity service client errors
#[derive(Error, Debug)]
pub enum RecommenderError {
    /// Invalid input provided to a client method
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP request failed (connection refused, DNS, TLS, ...)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Service answered with a non-200 status
    #[error("similarity service returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body was not a valid similarity payload
    #[error("Failed to parse similarity response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Request exceeded the configured client timeout
    #[error("Request to similarity service timed out")]
    Timeout,
}

impl RecommenderError {
    /// Whether the failure originated on the remote side or the network
    /// rather than in the request we built
    pub fn is_upstream(&self) -> bool {
        !matches!(self, RecommenderError::InvalidInput(_))
    }
}

/// Result type for similarity service operations
pub type RecommenderResult<T> = Result<T, RecommenderError>;
