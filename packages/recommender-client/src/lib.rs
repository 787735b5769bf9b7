//! Similarity service client for Encore
//!
//! This crate talks to the external audio-similarity service that powers
//! play-queue continuation. It exposes a single lookup: given the library
//! path of a track, return the paths of the nearest tracks, nearest first.
//!
//! # Example
//!
//! ```rust,no_run
//! use encore_recommender_client::RecommenderClient;
//! use encore_shared_config::RecommenderConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RecommenderConfig::with_url("http://localhost:8001");
//! let client = RecommenderClient::new(&config)?;
//!
//! let paths = client.similar_paths("Artist/Album/01 - Song.flac", 20).await?;
//! for path in paths {
//!     println!("{}", path);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Environment Variables
//!
//! - `RECOMMENDER_URL`: base URL of the similarity service
//! - `RECOMMENDER_TIMEOUT`: request timeout in seconds (default 30)

mod client;
mod error;
mod models;

pub use client::RecommenderClient;
pub use error::{RecommenderError, RecommenderResult};
pub use models::{ResultMetadata, SimilarRequest, SimilarResponse, SimilarResult};
