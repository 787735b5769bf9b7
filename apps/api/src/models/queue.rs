//! Play queue model
//!
//! Each user owns at most one play queue. Items are track snapshots taken at
//! enqueue time. `version` increases on every successful store and is used
//! for compare-and-swap, so two writers can never silently overwrite each
//! other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::Track;

/// Maximum queue size to prevent abuse
pub const MAX_QUEUE_SIZE: usize = 10_000;

/// Provenance tag written when continuation appends tracks
pub const CHANGED_BY_AUTO: &str = "similar-songs-auto";

/// A user's play queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayQueue {
    /// User who owns this queue
    pub user_id: Uuid,

    /// Ordered track snapshots
    pub items: Vec<Track>,

    /// Index of the current item
    pub current: usize,

    /// Offset inside the current track in milliseconds
    pub position_ms: i64,

    /// Client or process that last changed the queue
    pub changed_by: String,

    /// Monotonic version; 0 means the queue has never been stored
    pub version: i64,

    /// Last time the queue was stored
    pub updated_at: DateTime<Utc>,
}

/// Fields of a [`PlayQueue`] that a store may write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueField {
    Current,
    Position,
    Items,
    ChangedBy,
}

impl QueueField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Position => "position",
            Self::Items => "items",
            Self::ChangedBy => "changed_by",
        }
    }
}

/// Errors that can occur during queue validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueValidationError {
    #[error("queue exceeds maximum size of {MAX_QUEUE_SIZE} (got {0})")]
    TooManyTracks(usize),

    #[error("current index {index} is out of bounds for queue of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}

impl PlayQueue {
    /// Fresh, never-stored queue holding only `track`
    pub fn new_with(user_id: Uuid, track: Track, changed_by: impl Into<String>) -> Self {
        Self {
            user_id,
            items: vec![track],
            current: 0,
            position_ms: 0,
            changed_by: changed_by.into(),
            version: 0,
            updated_at: Utc::now(),
        }
    }

    /// Whether this queue has been persisted before
    pub fn is_stored(&self) -> bool {
        self.version > 0
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Index of the first item with `track_id`
    pub fn locate(&self, track_id: &str) -> Option<usize> {
        self.items.iter().position(|t| t.id == track_id)
    }

    /// True when the current item is the last one
    pub fn is_at_end(&self) -> bool {
        !self.items.is_empty() && self.current == self.items.len() - 1
    }

    /// Discard every item and keep only `track`
    pub fn replace_with(&mut self, track: Track) {
        self.items = vec![track];
        self.current = 0;
        self.position_ms = 0;
    }

    /// Append tracks after the last item
    pub fn append(&mut self, tracks: impl IntoIterator<Item = Track>) {
        self.items.extend(tracks);
    }

    /// Validate the queue before it is written
    pub fn validate(&self) -> Result<(), QueueValidationError> {
        if self.items.len() > MAX_QUEUE_SIZE {
            return Err(QueueValidationError::TooManyTracks(self.items.len()));
        }

        if !self.items.is_empty() && self.current >= self.items.len() {
            return Err(QueueValidationError::IndexOutOfBounds {
                index: self.current,
                len: self.items.len(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_of(ids: &[&str], current: usize) -> PlayQueue {
        let mut queue = PlayQueue::new_with(Uuid::new_v4(), Track::new(ids[0], "p"), "test");
        queue.items = ids
            .iter()
            .map(|id| Track::new(*id, format!("{}.mp3", id)))
            .collect();
        queue.current = current;
        queue
    }

    #[test]
    fn test_new_with_is_singleton_unstored() {
        let user = Uuid::new_v4();
        let queue = PlayQueue::new_with(user, Track::new("x", "x.mp3"), "web");

        assert_eq!(queue.user_id, user);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.current, 0);
        assert_eq!(queue.version, 0);
        assert!(!queue.is_stored());
        assert!(queue.is_at_end());
    }

    #[test]
    fn test_locate_returns_first_match() {
        let queue = queue_of(&["a", "b", "a"], 0);
        assert_eq!(queue.locate("a"), Some(0));
        assert_eq!(queue.locate("b"), Some(1));
        assert_eq!(queue.locate("z"), None);
    }

    #[test]
    fn test_is_at_end() {
        assert!(!queue_of(&["x", "y"], 0).is_at_end());
        assert!(queue_of(&["x", "y"], 1).is_at_end());

        let mut empty = queue_of(&["x"], 0);
        empty.items.clear();
        assert!(!empty.is_at_end());
    }

    #[test]
    fn test_replace_with_discards_items() {
        let mut queue = queue_of(&["a", "b", "c"], 2);
        queue.position_ms = 1234;
        queue.replace_with(Track::new("z", "z.mp3"));

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.items[0].id, "z");
        assert_eq!(queue.current, 0);
        assert_eq!(queue.position_ms, 0);
    }

    #[test]
    fn test_append_keeps_order() {
        let mut queue = queue_of(&["a"], 0);
        queue.append(vec![Track::new("b", "b.mp3"), Track::new("c", "c.mp3")]);

        let ids: Vec<_> = queue.items.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(queue.current, 0);
    }

    #[test]
    fn test_validation_index_out_of_bounds() {
        let queue = queue_of(&["a"], 3);
        assert_eq!(
            queue.validate(),
            Err(QueueValidationError::IndexOutOfBounds { index: 3, len: 1 })
        );
    }

    #[test]
    fn test_validation_empty_queue_ok() {
        let mut queue = queue_of(&["a"], 0);
        queue.items.clear();
        assert!(queue.validate().is_ok());
    }

    #[test]
    fn test_queue_field_names() {
        assert_eq!(QueueField::Current.as_str(), "current");
        assert_eq!(QueueField::ChangedBy.as_str(), "changed_by");
    }
}
