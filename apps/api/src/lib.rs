//! Encore API
//!
//! Annotations, scrobbling and play queue continuation for a music server.
//! The binary in `main.rs` wires these modules together; integration tests
//! drive them directly.

pub mod config;
pub mod error;
pub mod events;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use events::{EventBroker, EventNotifier};
pub use services::{AnnotationService, QueueContinuationEngine, ScrobbleCoordinator};
