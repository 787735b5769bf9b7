//! Similar-track recommendations
//!
//! Wraps the similarity service client. The service may have indexed the
//! music library under a different root than ours (for example a Windows
//! share), so paths are translated on the way out and back.

use async_trait::async_trait;
use encore_recommender_client::{RecommenderClient, RecommenderError, RecommenderResult};
use encore_shared_config::RecommenderConfig;
use tracing::{debug, instrument};

use crate::models::Track;

/// Source of similar tracks
#[async_trait]
pub trait Recommender: Send + Sync {
    /// Library-relative paths of tracks similar to `track`, nearest first
    async fn similar_paths(&self, track: &Track, limit: u32) -> RecommenderResult<Vec<String>>;
}

/// [`Recommender`] backed by the remote similarity service
#[derive(Debug, Clone)]
pub struct SimilarityRecommender {
    client: RecommenderClient,
    remote_root: Option<String>,
}

impl SimilarityRecommender {
    /// Build from configuration
    ///
    /// # Errors
    /// Returns `RecommenderError::Http` if the HTTP client cannot be built
    pub fn new(config: &RecommenderConfig) -> Result<Self, RecommenderError> {
        Ok(Self {
            client: RecommenderClient::new(config)?,
            remote_root: config.remote_library_root.clone(),
        })
    }

    /// Path the similarity service knows `library_path` by
    fn to_remote(&self, library_path: &str) -> String {
        match &self.remote_root {
            Some(root) => to_remote_path(root, library_path),
            None => library_path.to_string(),
        }
    }

    /// Library-relative form of a path returned by the service
    fn from_remote(&self, remote_path: &str) -> String {
        match &self.remote_root {
            Some(root) => from_remote_path(root, remote_path),
            None => remote_path.to_string(),
        }
    }
}

#[async_trait]
impl Recommender for SimilarityRecommender {
    #[instrument(skip(self, track), fields(track_id = %track.id))]
    async fn similar_paths(&self, track: &Track, limit: u32) -> RecommenderResult<Vec<String>> {
        let query = self.to_remote(&track.path);
        let remote_paths = self.client.similar_paths(&query, limit).await?;

        let paths: Vec<String> = remote_paths
            .iter()
            .map(|p| self.from_remote(p))
            .collect();

        debug!(count = paths.len(), "Similarity service returned candidates");
        Ok(paths)
    }
}

fn separator_of(root: &str) -> char {
    if root.contains('\\') {
        '\\'
    } else {
        '/'
    }
}

/// Join a `/`-separated library path onto `root` using the root's separator
pub fn to_remote_path(root: &str, library_path: &str) -> String {
    let sep = separator_of(root);
    let root = root.trim_end_matches(['/', '\\']);
    let relative = library_path
        .trim_start_matches(['/', '\\'])
        .replace(['/', '\\'], &sep.to_string());
    format!("{}{}{}", root, sep, relative)
}

/// Strip `root` from `remote_path` and normalize separators to `/`
///
/// `root` only matches whole path components: `C:\lib` is not a prefix of
/// `C:\library\x.mp3`.
pub fn from_remote_path(root: &str, remote_path: &str) -> String {
    let root = root.trim_end_matches(['/', '\\']);
    let relative = match remote_path.strip_prefix(root) {
        Some(rest) if rest.is_empty() || rest.starts_with(['/', '\\']) => rest,
        _ => remote_path,
    };
    relative.trim_start_matches(['/', '\\']).replace('\\', "/")
}
