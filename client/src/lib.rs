//! Client-side sync layer for a users/tasks REST API.
//!
//! Fetches and caches remote collections, keeps the selected user and the
//! completion filter in the page address, and applies task completion
//! toggles optimistically with rollback on failure.

pub mod config;
pub mod domain;
pub mod outbound;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::ClientSettings;
