//! Shared test utilities for the Encore workspace
//!
//! This crate provides mock implementations of external services for testing
//! without network dependencies.
//!
//! # Mock Services
//!
//! - [`MockRecommenderServer`] - Mock similarity service for queue continuation tests
//!
//! # Example
//!
//! ```rust,ignore
//! use encore_test_utils::MockRecommenderServer;
//!
//! #[tokio::test]
//! async fn test_with_mocks() {
//!     let recommender = MockRecommenderServer::start().await;
//!     recommender.mock_similar_paths(&["a.mp3", "b.mp3"]).await;
//!
//!     // Use recommender.url() to configure your client
//! }
//! ```

mod recommender;

pub use recommender::{similar_response_json, MockRecommenderServer, SIMILAR_PATH};
