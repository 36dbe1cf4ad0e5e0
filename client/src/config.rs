//! Client configuration loaded via OrthoConfig.

use std::path::PathBuf;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::{NoticeConfig, RetryPolicy, SyncConfig};

const DEFAULT_API_BASE_URL: &str = "https://jsonplaceholder.typicode.com";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_READ_RETRIES: u32 = 3;
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1_000;
const DEFAULT_STALE_AFTER_SECS: u64 = 300;
const DEFAULT_NOTICE_VISIBLE_MS: u64 = 3_000;
const DEFAULT_NOTICE_EXIT_MS: u64 = 300;

/// Settings for the remote API, cache and notices.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "TASKBOARD")]
pub struct ClientSettings {
    /// Root URL of the users/todos API.
    pub api_base_url: Option<String>,
    /// Per-request deadline in seconds.
    pub request_timeout_secs: Option<u64>,
    /// Retries after the first failed read.
    pub max_read_retries: Option<u32>,
    /// Delay before the first read retry, in milliseconds.
    pub initial_backoff_ms: Option<u64>,
    /// Age in seconds after which cached data is refreshed in the background.
    pub stale_after_secs: Option<u64>,
    /// How long a notice stays visible, in milliseconds.
    pub notice_visible_ms: Option<u64>,
    /// Length of a notice's exit transition, in milliseconds.
    pub notice_exit_ms: Option<u64>,
    /// File holding the persisted address; in memory when unset.
    pub state_file: Option<PathBuf>,
}

impl ClientSettings {
    /// Return the API root, falling back to the public demo service.
    pub fn api_base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL)
    }

    /// Return the per-request deadline.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    /// Return the read retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_read_retries.unwrap_or(DEFAULT_MAX_READ_RETRIES),
            initial_backoff: Duration::from_millis(
                self.initial_backoff_ms.unwrap_or(DEFAULT_INITIAL_BACKOFF_MS),
            ),
        }
    }

    /// Return the cache settings.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            stale_after: Duration::from_secs(
                self.stale_after_secs.unwrap_or(DEFAULT_STALE_AFTER_SECS),
            ),
        }
    }

    /// Return the notice timing.
    pub fn notice_config(&self) -> NoticeConfig {
        NoticeConfig {
            visible_for: Duration::from_millis(
                self.notice_visible_ms.unwrap_or(DEFAULT_NOTICE_VISIBLE_MS),
            ),
            exit_transition: Duration::from_millis(
                self.notice_exit_ms.unwrap_or(DEFAULT_NOTICE_EXIT_MS),
            ),
        }
    }
}
