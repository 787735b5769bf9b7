//! Common test utilities for API integration tests
//!
//! In-memory implementations of the storage, scrobble, recommender and
//! event traits, plus fixtures for library records and request identity.

#![allow(dead_code, unused_imports)]

pub mod fakes;
pub mod fixtures;

pub use fakes::*;
pub use fixtures::*;
