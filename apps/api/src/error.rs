//! API error type
//!
//! Every fallible handler returns [`ApiResult`]. Repository, scrobble and
//! recommender failures convert into [`ApiError`] by variant, and the error
//! renders itself as a JSON body carrying a stable machine-readable code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use encore_recommender_client::RecommenderError;
use serde::Serialize;
use thiserror::Error;

use crate::repositories::RepositoryError;
use crate::services::scrobble::ScrobbleError;

/// JSON body of an error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Error, Debug)]
pub enum ApiError {
    /// The front end did not forward the caller's identity
    #[error("request identity missing: {0}")]
    MissingIdentity(&'static str),

    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// A compare-and-swap write lost to a concurrent writer
    #[error("{resource_type} was modified concurrently: {id}")]
    Conflict {
        resource_type: &'static str,
        id: String,
    },

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("scrobble backend error: {0}")]
    Scrobble(String),

    #[error("similarity service error: {0}")]
    Recommender(#[from] RecommenderError),

    #[error("event bus error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal server error: {0}")]
    Internal(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn not_found(resource_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            id: id.into(),
        }
    }

    /// HTTP status and wire code of this error
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            Self::MissingIdentity(_) => (StatusCode::UNAUTHORIZED, "MISSING_IDENTITY"),
            Self::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Conflict { .. } => (StatusCode::CONFLICT, "CONFLICT"),
            Self::ValidationError(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::MissingField(_) => (StatusCode::BAD_REQUEST, "MISSING_FIELD"),
            Self::Serialization(_) => (StatusCode::UNPROCESSABLE_ENTITY, "SERIALIZATION_ERROR"),
            Self::Scrobble(_) => (StatusCode::BAD_GATEWAY, "SCROBBLE_ERROR"),
            Self::Recommender(_) => (StatusCode::BAD_GATEWAY, "RECOMMENDER_ERROR"),
            Self::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            Self::Redis(_) => (StatusCode::INTERNAL_SERVER_ERROR, "EVENT_BUS_ERROR"),
            Self::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.classify().0
    }

    pub fn error_code(&self) -> &'static str {
        self.classify().1
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();
        if status.is_server_error() {
            tracing::error!(error = %self, code, status = status.as_u16(), "Request failed");
        } else {
            tracing::debug!(error = %self, code, status = status.as_u16(), "Request rejected");
        }

        let body = ErrorResponse {
            code,
            message: self.to_string(),
            details: None,
        };
        (status, Json(body)).into_response()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { kind, id } => Self::not_found(kind, id),
            RepositoryError::Conflict { user_id, .. } => Self::Conflict {
                resource_type: "playqueue",
                id: user_id.to_string(),
            },
            RepositoryError::Validation(msg) => Self::ValidationError(msg),
            RepositoryError::Database(e) => Self::Database(e),
        }
    }
}

impl From<ScrobbleError> for ApiError {
    fn from(err: ScrobbleError) -> Self {
        match err {
            ScrobbleError::Validation(msg) => Self::ValidationError(msg),
            ScrobbleError::Repository(e) => e.into(),
            backend => Self::Scrobble(backend.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        err.downcast::<ApiError>()
            .unwrap_or_else(|err| Self::Internal(err.to_string()))
    }
}
