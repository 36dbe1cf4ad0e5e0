//! Driven port for the external, human-readable location that persists UI
//! state (the page address).

use thiserror::Error;
use url::Url;

/// Errors surfaced while reading or replacing the location.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressBarError {
    /// The backing medium could not be read or written.
    #[error("address bar io failed: {message}")]
    Io {
        /// Underlying diagnostic.
        message: String,
    },
    /// The stored location is not a valid absolute URL.
    #[error("address bar holds an invalid location: {message}")]
    InvalidLocation {
        /// Parser diagnostic.
        message: String,
    },
}

impl AddressBarError {
    /// Build an [`AddressBarError::Io`].
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Build an [`AddressBarError::InvalidLocation`].
    pub fn invalid_location(message: impl Into<String>) -> Self {
        Self::InvalidLocation {
            message: message.into(),
        }
    }
}

/// Port for the page address.
///
/// `replace` must swap the whole location in one write so readers never see
/// a half-applied update.
#[cfg_attr(test, mockall::automock)]
pub trait AddressBar: Send + Sync {
    /// Current location.
    fn location(&self) -> Result<Url, AddressBarError>;

    /// Replace the current location.
    fn replace(&self, location: &Url) -> Result<(), AddressBarError>;
}
