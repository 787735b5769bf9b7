//! Shared helpers for repositories

use crate::models::EntityKind;

/// SQL columns for track queries
pub const TRACK_COLUMNS: &str = r#"
    id, title, album_id, artist_id, album, artist, path, duration_ms
"#;

/// Library table holding records of `kind`
pub fn table_for(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Artist => "artists",
        EntityKind::Album => "albums",
        EntityKind::Song => "tracks",
    }
}

/// Advisory lock key taken by immediate annotation transactions
///
/// Every batch writer takes the same key, so batches are serialized as soon
/// as they begin rather than at first conflicting write.
pub const ANNOTATION_WRITE_LOCK: i64 = 0x656e_636f_7265_0001;
