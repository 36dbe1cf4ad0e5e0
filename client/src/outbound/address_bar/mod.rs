//! Address bar adapters.
//!
//! `InMemoryAddressBar` stands in for a live page address; `FileAddressBar`
//! keeps the address in a one-line text file so state survives process
//! restarts the way a page reload keeps its URL.

mod file;
mod memory;

pub use file::FileAddressBar;
pub use memory::InMemoryAddressBar;
