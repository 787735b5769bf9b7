//! Library and identity fixtures

use encore_api::models::{Album, Artist, Player, RequestContext, Track, UserIdentity};
use uuid::Uuid;

pub fn artist(id: &str) -> Artist {
    Artist {
        id: id.to_string(),
        name: format!("Artist {}", id),
    }
}

pub fn album(id: &str) -> Album {
    Album {
        id: id.to_string(),
        name: format!("Album {}", id),
        artist_id: None,
    }
}

/// Track whose path is derived from its id
pub fn track(id: &str) -> Track {
    Track::new(id, format!("library/{}.flac", id))
}

pub fn context(user_id: Uuid) -> RequestContext {
    RequestContext {
        user: UserIdentity {
            id: user_id,
            username: "ana".to_string(),
        },
        player: Player {
            id: "player-1".to_string(),
            name: "Kitchen".to_string(),
        },
        client: "encore-web".to_string(),
        client_unique_id: None,
    }
}
