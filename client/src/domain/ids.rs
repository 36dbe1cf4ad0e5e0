//! Nominal identifiers for users and tasks.
//!
//! Both identifiers are positive integers on the wire. They are kept as
//! distinct types so a task id can never be passed where a user id is
//! expected. Text coming from an untrusted source (the address bar) is parsed
//! with `parse_untrusted`, which yields `None` instead of a garbage value.

use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

use thiserror::Error;

/// Validation errors returned when constructing an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierValidationError {
    /// Identifier was zero.
    #[error("{kind} id must be greater than zero")]
    Zero {
        /// Identifier kind (`user` or `task`).
        kind: &'static str,
    },
    /// Identifier text was not a positive integer.
    #[error("{kind} id must be a positive integer, got {raw:?}")]
    NotAnInteger {
        /// Identifier kind (`user` or `task`).
        kind: &'static str,
        /// Rejected input.
        raw: String,
    },
}

macro_rules! define_identifier {
    ($(#[$outer:meta])* $name:ident, $kind:literal) => {
        $(#[$outer])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(NonZeroU64);

        impl $name {
            /// Validate and construct the identifier from a raw integer.
            pub fn new(raw: u64) -> Result<Self, IdentifierValidationError> {
                NonZeroU64::new(raw)
                    .map(Self)
                    .ok_or(IdentifierValidationError::Zero { kind: $kind })
            }

            /// Parse untrusted text, treating anything but a positive
            /// decimal integer as absent.
            pub fn parse_untrusted(raw: &str) -> Option<Self> {
                raw.parse().ok()
            }

            /// Return the raw integer value.
            pub const fn get(self) -> u64 {
                self.0.get()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = IdentifierValidationError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                if raw.is_empty() || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
                    return Err(IdentifierValidationError::NotAnInteger {
                        kind: $kind,
                        raw: raw.to_owned(),
                    });
                }
                let value = raw.parse::<u64>().map_err(|_| {
                    IdentifierValidationError::NotAnInteger {
                        kind: $kind,
                        raw: raw.to_owned(),
                    }
                })?;
                Self::new(value)
            }
        }

        impl TryFrom<u64> for $name {
            type Error = IdentifierValidationError;

            fn try_from(value: u64) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for u64 {
            fn from(value: $name) -> Self {
                value.get()
            }
        }
    };
}

define_identifier!(
    /// Identifier of a remote user.
    UserId,
    "user"
);

define_identifier!(
    /// Identifier of a remote task.
    TaskId,
    "task"
);
