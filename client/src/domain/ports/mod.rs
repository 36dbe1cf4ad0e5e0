//! Domain ports and supporting types for the hexagonal boundary.

mod address_bar;
mod todo_api;

#[cfg(test)]
pub use address_bar::MockAddressBar;
pub use address_bar::{AddressBar, AddressBarError};
#[cfg(test)]
pub use todo_api::MockTodoApi;
pub use todo_api::{FetchError, FetchErrorKind, TodoApi};
