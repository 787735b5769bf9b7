//! Similarity service wire models

use serde::{Deserialize, Serialize};

/// Body of `POST /v1/music/similar`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimilarRequest {
    /// Path of the query track as indexed by the service
    pub file_path: String,
    /// Maximum number of results
    pub top_k: u32,
}

/// Response of `POST /v1/music/similar`
///
/// Results are ordered nearest match first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarResponse {
    #[serde(default)]
    pub query_file: String,
    #[serde(default)]
    pub results: Vec<SimilarResult>,
    #[serde(default)]
    pub count: u32,
}

/// A single similarity match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarResult {
    #[serde(default)]
    pub id: String,
    pub metadata: ResultMetadata,
    #[serde(default)]
    pub distance: f64,
}

/// Descriptive fields attached to a match
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultMetadata {
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub song_name: Option<String>,
    #[serde(default)]
    pub album_name: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    pub file_path: String,
}

impl SimilarResponse {
    /// File paths of the matches, in response order
    pub fn file_paths(&self) -> Vec<String> {
        self.results
            .iter()
            .map(|r| r.metadata.file_path.clone())
            .collect()
    }
}
