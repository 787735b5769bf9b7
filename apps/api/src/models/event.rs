//! Resource refresh events
//!
//! A [`RefreshEvent`] collects the resources a unit of work touched and is
//! published once that work has completed.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::EntityKind;

/// Kind of resource a client may need to reload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Artist,
    Album,
    Song,
    PlayQueue,
}

impl From<EntityKind> for ResourceKind {
    fn from(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Artist => Self::Artist,
            EntityKind::Album => Self::Album,
            EntityKind::Song => Self::Song,
        }
    }
}

/// Accumulated set of (kind, id) pairs
///
/// Serializes as `{"resources": {"album": ["a1"], "song": ["s1", "s2"]}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshEvent {
    pub resources: BTreeMap<ResourceKind, BTreeSet<String>>,
}

impl RefreshEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`RefreshEvent::add`]
    pub fn with(mut self, kind: impl Into<ResourceKind>, id: impl Into<String>) -> Self {
        self.add(kind, id);
        self
    }

    pub fn add(&mut self, kind: impl Into<ResourceKind>, id: impl Into<String>) {
        self.resources
            .entry(kind.into())
            .or_default()
            .insert(id.into());
    }

    pub fn contains(&self, kind: ResourceKind, id: &str) -> bool {
        self.resources
            .get(&kind)
            .is_some_and(|ids| ids.contains(id))
    }

    /// Ids recorded for `kind`, in sorted order
    pub fn ids(&self, kind: ResourceKind) -> Vec<&str> {
        self.resources
            .get(&kind)
            .map(|ids| ids.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Total number of distinct pairs
    pub fn len(&self) -> usize {
        self.resources.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_accumulates_and_dedups() {
        let mut event = RefreshEvent::new();
        event.add(EntityKind::Album, "a1");
        event.add(EntityKind::Song, "s2");
        event.add(EntityKind::Song, "s1");
        event.add(EntityKind::Song, "s1");

        assert_eq!(event.len(), 3);
        assert_eq!(event.ids(ResourceKind::Song), vec!["s1", "s2"]);
        assert!(event.contains(ResourceKind::Album, "a1"));
        assert!(!event.contains(ResourceKind::Artist, "a1"));
    }

    #[test]
    fn test_event_wire_shape() {
        let event = RefreshEvent::new()
            .with(ResourceKind::PlayQueue, "u1")
            .with(EntityKind::Artist, "ar1");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"resources": {"artist": ["ar1"], "playqueue": ["u1"]}})
        );

        let back: RefreshEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_empty_event() {
        assert!(RefreshEvent::new().is_empty());
    }
}
