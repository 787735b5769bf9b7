//! Request identity extractor
//!
//! Encore sits behind a front end that authenticates users and forwards the
//! resolved identity in headers. `RequestContext` is built from them once per
//! request:
//!
//! | Header                       | Field                  | Required |
//! |------------------------------|------------------------|----------|
//! | `x-encore-user-id`           | `user.id` (UUID)       | yes      |
//! | `x-encore-username`          | `user.username`        | no       |
//! | `x-encore-player-id`         | `player.id`            | no       |
//! | `x-encore-player-name`       | `player.name`          | no       |
//! | `x-encore-client`            | `client`               | no       |
//! | `x-encore-client-unique-id`  | `client_unique_id`     | no       |
//!
//! Without a player id header the player id is `<user id>:<client>`, so
//! now-playing state of anonymous players never shares a key across users
//! or client applications.
//!
//! # Usage
//!
//! ```rust,ignore
//! async fn handler(ctx: RequestContext) -> impl IntoResponse {
//!     format!("Hello, {}!", ctx.user.username)
//! }
//! ```

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{Player, RequestContext, UserIdentity};

pub const USER_ID_HEADER: &str = "x-encore-user-id";
pub const USERNAME_HEADER: &str = "x-encore-username";
pub const PLAYER_ID_HEADER: &str = "x-encore-player-id";
pub const PLAYER_NAME_HEADER: &str = "x-encore-player-name";
pub const CLIENT_HEADER: &str = "x-encore-client";
pub const CLIENT_UNIQUE_ID_HEADER: &str = "x-encore-client-unique-id";

/// Client name used when the request does not name one
const UNKNOWN_CLIENT: &str = "unknown";

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw_id = header(parts, USER_ID_HEADER).ok_or(ApiError::MissingIdentity("user id"))?;
        let user_id = Uuid::parse_str(raw_id).map_err(|_| {
            tracing::debug!(value = raw_id, "Rejected malformed user id header");
            ApiError::MissingIdentity("user id")
        })?;

        let username = header(parts, USERNAME_HEADER)
            .map(str::to_string)
            .unwrap_or_else(|| user_id.to_string());
        let client = header(parts, CLIENT_HEADER).unwrap_or(UNKNOWN_CLIENT).to_string();
        let player_id = header(parts, PLAYER_ID_HEADER)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}:{}", user_id, client));
        let player_name = header(parts, PLAYER_NAME_HEADER)
            .map(str::to_string)
            .unwrap_or_else(|| client.clone());

        Ok(RequestContext {
            user: UserIdentity {
                id: user_id,
                username,
            },
            player: Player {
                id: player_id,
                name: player_name,
            },
            client,
            client_unique_id: header(parts, CLIENT_UNIQUE_ID_HEADER).map(str::to_string),
        })
    }
}
