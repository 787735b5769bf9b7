//! Annotatable library entities
//!
//! Ratings and stars apply to three kinds of library records. The kind is
//! carried explicitly so callers branch on [`EntityKind`] rather than on the
//! shape of a value.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Album, Artist, Track};

/// Kind of an annotatable entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Artist,
    Album,
    Song,
}

impl EntityKind {
    /// Value stored in `annotations.item_type`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Artist => "artist",
            Self::Album => "album",
            Self::Song => "song",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A library record tagged with its kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotatableEntity {
    Artist(Artist),
    Album(Album),
    Song(Track),
}

impl AnnotatableEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Artist(_) => EntityKind::Artist,
            Self::Album(_) => EntityKind::Album,
            Self::Song(_) => EntityKind::Song,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Artist(a) => &a.id,
            Self::Album(a) => &a.id,
            Self::Song(t) => &t.id,
        }
    }
}
