//! Test utilities for the taskboard crate.
//!
//! Shared by unit tests (in `src/`) and integration tests (in `tests/`).
//! Compiled for tests and behind the `test-support` feature.

mod clock;
pub mod fixtures;
mod scripted_api;
mod sleeper;

pub use clock::MutableClock;
pub use scripted_api::{PutScript, ScriptedTodoApi};
pub use sleeper::{ImmediateSleeper, RecordingSleeper};
