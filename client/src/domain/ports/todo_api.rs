//! Driven port for the remote users/tasks API.
//!
//! The domain owns the failure taxonomy so retry and rollback decisions stay
//! adapter-agnostic. Adapters classify transport and status failures into
//! [`FetchError`] and validate payload shape before returning domain records.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::ids::UserId;
use crate::domain::task::Task;
use crate::domain::user::User;

/// Failure of one remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Transport failed or the request timed out.
    #[error("network failure: {message}")]
    Network {
        /// Transport diagnostic.
        message: String,
    },
    /// Response body did not match the expected shape.
    #[error("invalid response at {path}: {message}")]
    Validation {
        /// JSON path of the mismatch (`$[3].id`).
        path: String,
        /// Decoder diagnostic.
        message: String,
    },
    /// The resource does not exist.
    #[error("not found: {resource}")]
    NotFound {
        /// Requested resource path.
        resource: String,
    },
    /// Credentials missing or refused.
    #[error("unauthorized (status {status})")]
    Unauthorized {
        /// HTTP status (401 or 403).
        status: u16,
    },
    /// Any other non-success status.
    #[error("server fault (status {status}): {message}")]
    ServerFault {
        /// HTTP status.
        status: u16,
        /// Short body preview.
        message: String,
    },
}

/// Fieldless discriminant of [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// See [`FetchError::Network`].
    Network,
    /// See [`FetchError::Validation`].
    Validation,
    /// See [`FetchError::NotFound`].
    NotFound,
    /// See [`FetchError::Unauthorized`].
    Unauthorized,
    /// See [`FetchError::ServerFault`].
    ServerFault,
}

impl FetchError {
    /// Build a [`FetchError::Network`].
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Build a [`FetchError::Validation`].
    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Build a [`FetchError::NotFound`].
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Build a [`FetchError::Unauthorized`].
    pub const fn unauthorized(status: u16) -> Self {
        Self::Unauthorized { status }
    }

    /// Build a [`FetchError::ServerFault`].
    pub fn server_fault(status: u16, message: impl Into<String>) -> Self {
        Self::ServerFault {
            status,
            message: message.into(),
        }
    }

    /// Discriminant without payload.
    pub const fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Network { .. } => FetchErrorKind::Network,
            Self::Validation { .. } => FetchErrorKind::Validation,
            Self::NotFound { .. } => FetchErrorKind::NotFound,
            Self::Unauthorized { .. } => FetchErrorKind::Unauthorized,
            Self::ServerFault { .. } => FetchErrorKind::ServerFault,
        }
    }

    /// Return whether retrying this error is expected to help.
    ///
    /// Only transport failures qualify; every other kind is terminal for the
    /// call that produced it.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Operator-facing message for retry controls and error notices.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network { .. } => {
                "Could not reach the server. Check your connection and try again.".to_owned()
            }
            Self::Validation { .. } => {
                "The server sent data in an unexpected format.".to_owned()
            }
            Self::NotFound { .. } => "The requested item no longer exists.".to_owned(),
            Self::Unauthorized { .. } => "You are not allowed to access this item.".to_owned(),
            Self::ServerFault { status, .. } => {
                format!("The server failed to handle the request (status {status}).")
            }
        }
    }
}

/// Port for the remote users/tasks API.
///
/// Implementations perform exactly one request per call: retries, ordering
/// and ownership filtering belong to `RemoteClient`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TodoApi: Send + Sync {
    /// Fetch the users collection.
    async fn fetch_users(&self) -> Result<Vec<User>, FetchError>;

    /// Fetch the tasks of one user, as the server reports them.
    async fn fetch_tasks_for_user(&self, user: UserId) -> Result<Vec<Task>, FetchError>;

    /// Replace one task and return the server's echoed representation.
    async fn put_task(&self, task: &Task) -> Result<Task, FetchError>;
}

#[cfg(test)]
mod tests {
    //! Failure classification helpers.
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(FetchError::network("reset"), true)]
    #[case(FetchError::validation("$[0].id", "expected u64"), false)]
    #[case(FetchError::not_found("/users/9/todos"), false)]
    #[case(FetchError::unauthorized(401), false)]
    #[case(FetchError::server_fault(503, "unavailable"), false)]
    fn only_network_failures_are_retryable(#[case] error: FetchError, #[case] expected: bool) {
        assert_eq!(error.is_retryable(), expected);
    }

    #[rstest]
    fn validation_display_carries_path() {
        let error = FetchError::validation("$[3].address", "missing field `geo`");
        assert_eq!(
            error.to_string(),
            "invalid response at $[3].address: missing field `geo`"
        );
        assert_eq!(error.kind(), FetchErrorKind::Validation);
    }

    #[rstest]
    fn server_fault_message_mentions_status() {
        let message = FetchError::server_fault(502, "bad gateway").user_message();
        assert!(message.contains("502"), "message should name the status: {message}");
    }
}
