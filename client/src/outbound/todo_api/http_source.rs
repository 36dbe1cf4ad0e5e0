//! Reqwest-backed adapter for the users/todos REST API.
//!
//! This adapter owns transport details only: URL construction, the request
//! deadline, HTTP status classification and payload validation. Ordering,
//! ownership filtering and retries live in `RemoteClient`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use thiserror::Error;
use tracing::debug;

use super::dto::{TaskDto, parse_task, parse_tasks, parse_users};
use crate::domain::ports::{FetchError, TodoApi};
use crate::domain::{Task, User, UserId};

const DEFAULT_USER_AGENT: &str = concat!("taskboard/", env!("CARGO_PKG_VERSION"));

/// Errors raised while building a [`TodoHttpSource`].
#[derive(Debug, Error)]
pub enum TodoHttpSourceBuildError {
    /// The reqwest client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    /// The base URL cannot carry path segments.
    #[error("base URL {url} cannot be used as an API root")]
    InvalidBaseUrl {
        /// Offending URL.
        url: String,
    },
}

/// `TodoApi` implementation issuing one HTTP request per call.
pub struct TodoHttpSource {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl TodoHttpSource {
    /// Build an adapter rooted at `base_url` with a per-request deadline.
    ///
    /// # Errors
    ///
    /// Returns [`TodoHttpSourceBuildError`] when the client cannot be built
    /// or `base_url` cannot take path segments (`mailto:`, `data:`).
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, TodoHttpSourceBuildError> {
        if base_url.cannot_be_a_base() {
            return Err(TodoHttpSourceBuildError::InvalidBaseUrl {
                url: base_url.to_string(),
            });
        }
        let client = Client::builder().user_agent(DEFAULT_USER_AGENT).build()?;
        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send `request`, racing it against the deadline, and return the body
    /// of a successful response.
    async fn execute(&self, request: RequestBuilder, resource: &Url) -> Result<Vec<u8>, FetchError> {
        let exchange = async {
            let response = request
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .await
                .map_err(map_transport_error)?;
            let status = response.status();
            let body = response.bytes().await.map_err(map_transport_error)?;
            Ok::<_, FetchError>((status, body))
        };
        let (status, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                FetchError::network(format!(
                    "request to {} timed out after {}ms",
                    resource.path(),
                    self.timeout.as_millis()
                ))
            })??;
        debug!(path = resource.path(), status = status.as_u16(), bytes = body.len(), "response received");
        if !status.is_success() {
            return Err(map_status_error(status, resource, body.as_ref()));
        }
        Ok(body.to_vec())
    }
}

#[async_trait]
impl TodoApi for TodoHttpSource {
    async fn fetch_users(&self) -> Result<Vec<User>, FetchError> {
        let url = self.endpoint(&["users"]);
        let body = self.execute(self.client.get(url.clone()), &url).await?;
        parse_users(&body)
    }

    async fn fetch_tasks_for_user(&self, user: UserId) -> Result<Vec<Task>, FetchError> {
        let url = self.endpoint(&["users", &user.to_string(), "todos"]);
        let body = self.execute(self.client.get(url.clone()), &url).await?;
        parse_tasks(&body)
    }

    async fn put_task(&self, task: &Task) -> Result<Task, FetchError> {
        let url = self.endpoint(&["todos", &task.id.to_string()]);
        let request = self.client.put(url.clone()).json(&TaskDto::from(task));
        let body = self.execute(request, &url).await?;
        parse_task(&body)
    }
}

fn map_transport_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::network(format!("request timed out: {error}"))
    } else {
        FetchError::network(error.to_string())
    }
}

fn map_status_error(status: StatusCode, resource: &Url, body: &[u8]) -> FetchError {
    match status {
        StatusCode::NOT_FOUND => FetchError::not_found(resource.path()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            FetchError::unauthorized(status.as_u16())
        }
        _ => FetchError::server_fault(status.as_u16(), body_preview(body)),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
