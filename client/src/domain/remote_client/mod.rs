//! Remote resource client.
//!
//! Wraps the [`TodoApi`] port with the read retry policy and the ordering and
//! ownership contracts the rest of the crate relies on:
//! - users come back sorted by name, case-insensitively;
//! - tasks come back sorted by id and never include another user's task;
//! - only reads that fail with [`FetchError::Network`] are retried, with
//!   exponential backoff; writes are never retried here.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, warn};

use crate::domain::ids::UserId;
use crate::domain::ports::{FetchError, TodoApi};
use crate::domain::task::Task;
use crate::domain::user::{User, sort_by_name};

mod runtime;

pub use runtime::TokioSleeper;

/// Read retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each further retry.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = 2_u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff.saturating_mul(exponent)
    }
}

/// Async clock-independent sleeping abstraction for retries.
#[async_trait]
pub trait RetrySleeper: Send + Sync {
    /// Suspend execution for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Remote resource client over the [`TodoApi`] port.
#[derive(Clone)]
pub struct RemoteClient {
    api: Arc<dyn TodoApi>,
    sleeper: Arc<dyn RetrySleeper>,
    policy: RetryPolicy,
}

impl RemoteClient {
    /// Build a client sleeping on the Tokio timer.
    pub fn new(api: Arc<dyn TodoApi>, policy: RetryPolicy) -> Self {
        Self::with_sleeper(api, Arc::new(TokioSleeper), policy)
    }

    /// Build a client with an injected sleeper.
    pub fn with_sleeper(
        api: Arc<dyn TodoApi>,
        sleeper: Arc<dyn RetrySleeper>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            api,
            sleeper,
            policy,
        }
    }

    /// List every user, sorted by name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns the last [`FetchError`] once retries are exhausted, or the
    /// first non-retryable one.
    pub async fn list_users(&self) -> Result<Vec<User>, FetchError> {
        let api = &self.api;
        let mut users = self.with_retry("users", move || api.fetch_users()).await?;
        sort_by_name(&mut users);
        Ok(users)
    }

    /// List the tasks of `user`, sorted by id, dropping any task the server
    /// attributes to someone else.
    ///
    /// # Errors
    ///
    /// Returns the last [`FetchError`] once retries are exhausted, or the
    /// first non-retryable one.
    pub async fn list_tasks_for_user(&self, user: UserId) -> Result<Vec<Task>, FetchError> {
        let api = &self.api;
        let fetched = self
            .with_retry("tasks", move || api.fetch_tasks_for_user(user))
            .await?;
        let received = fetched.len();
        let mut tasks: Vec<Task> = fetched
            .into_iter()
            .filter(|task| task.user_id == user)
            .collect();
        if tasks.len() != received {
            warn!(
                user_id = user.get(),
                dropped = received - tasks.len(),
                "dropped tasks owned by another user"
            );
        }
        tasks.sort_by_key(|task| task.id);
        Ok(tasks)
    }

    /// Replace `task` remotely and return the server's echo. Never retried.
    ///
    /// # Errors
    ///
    /// Returns the [`FetchError`] of the single attempt.
    pub async fn update_task(&self, task: &Task) -> Result<Task, FetchError> {
        self.api.put_task(task).await.inspect_err(|error| {
            log_terminal("update_task", error);
        })
    }

    async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut retry = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(failure) if failure.is_retryable() && retry < self.policy.max_retries => {
                    retry += 1;
                    let delay = self.policy.delay_for(retry);
                    warn!(
                        operation,
                        attempt = retry,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %failure,
                        "retrying read after transport failure"
                    );
                    self.sleeper.sleep(delay).await;
                }
                Err(failure) => {
                    log_terminal(operation, &failure);
                    return Err(failure);
                }
            }
        }
    }
}

fn log_terminal(operation: &'static str, failure: &FetchError) {
    match failure {
        FetchError::Validation { path, message } => {
            error!(operation, %path, %message, "response failed validation");
        }
        other => warn!(operation, error = %other, "remote call failed"),
    }
}
