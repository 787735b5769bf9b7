//! Artist and album rows
//!
//! Only the columns the resolver and annotations need are mapped. Tracks
//! live in [`super::track`] because queues snapshot them.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    /// `None` for compilations
    pub artist_id: Option<String>,
}
