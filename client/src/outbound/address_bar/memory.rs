//! Process-local address bar.

use std::sync::{Mutex, MutexGuard, PoisonError};

use url::Url;

use crate::domain::ports::{AddressBar, AddressBarError};

/// Address bar held in memory.
#[derive(Debug)]
pub struct InMemoryAddressBar {
    location: Mutex<Url>,
}

impl InMemoryAddressBar {
    /// Start at `location`.
    pub fn new(location: Url) -> Self {
        Self {
            location: Mutex::new(location),
        }
    }

    /// Current location, without the `Result` of the port method.
    pub fn current(&self) -> Url {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Url> {
        self.location.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AddressBar for InMemoryAddressBar {
    fn location(&self) -> Result<Url, AddressBarError> {
        Ok(self.current())
    }

    fn replace(&self, location: &Url) -> Result<(), AddressBarError> {
        *self.lock() = location.clone();
        Ok(())
    }
}
