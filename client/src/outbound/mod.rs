//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **todo_api**: reqwest-backed client for the users/todos REST API
//! - **address_bar**: in-memory and file-backed stores for the page address
//!
//! Adapters are thin translators between domain types and transport
//! representations. They contain no business logic.

pub mod address_bar;
pub mod todo_api;
