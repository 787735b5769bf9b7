//! Library tracks
//!
//! A [`Track`] doubles as the snapshot stored inside play queues: queue
//! items are serialized copies taken when the track was enqueued, so later
//! edits to the library row never rewrite an existing queue.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A `tracks` row, also the item type of play queues
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub album_id: Option<String>,
    pub artist_id: Option<String>,
    /// Album title at the time of the snapshot
    pub album: Option<String>,
    /// Artist name at the time of the snapshot
    pub artist: Option<String>,
    /// Relative to the music library root, `/`-separated
    pub path: String,
    pub duration_ms: i32,
}

impl Track {
    /// Track with only an id and a path; the title repeats the id
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            album_id: None,
            artist_id: None,
            album: None,
            artist: None,
            path: path.into(),
            duration_ms: 0,
        }
    }
}
