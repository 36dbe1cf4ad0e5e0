//! Users/todos REST API outbound adapter.
//!
//! This module provides a thin HTTP implementation of the `TodoApi` port.

mod dto;
mod http_source;

pub use http_source::{TodoHttpSource, TodoHttpSourceBuildError};
