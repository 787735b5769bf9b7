//! Playback submission model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completed play of a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub track_id: String,
    pub timestamp: DateTime<Utc>,
}

impl Submission {
    pub fn new(track_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            track_id: track_id.into(),
            timestamp,
        }
    }
}
