//! Middleware components for Encore API
//!
//! This module provides the `RequestContext` extractor, which reads the
//! identity headers forwarded by the front end. Requests without a valid
//! user id are rejected with 401.

pub mod context;

pub use context::{
    CLIENT_HEADER, CLIENT_UNIQUE_ID_HEADER, PLAYER_ID_HEADER, PLAYER_NAME_HEADER, USERNAME_HEADER,
    USER_ID_HEADER,
};
