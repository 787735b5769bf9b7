//! Request-scoped identity
//!
//! Identity is resolved once per request and passed around as a value. Work
//! that outlives the request receives the pieces it needs explicitly.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authenticated user as asserted by the front end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: Uuid,
    pub username: String,
}

/// Player (device/app instance) the request came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
}

/// Identity attached to every annotation and scrobble request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub user: UserIdentity,
    pub player: Player,
    /// Client application name
    pub client: String,
    /// Per-installation identifier, when the client sends one
    pub client_unique_id: Option<String>,
}

impl RequestContext {
    /// Identifier used to key now-playing state: the client-unique id when
    /// present, otherwise the player id
    pub fn client_id(&self) -> &str {
        self.client_unique_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.player.id)
    }
}
