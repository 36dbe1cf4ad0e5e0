//! Ephemeral operator notices raised by mutation outcomes.
//!
//! A notice is visible for [`NoticeConfig::visible_for`], then spends
//! [`NoticeConfig::exit_transition`] in the `Exiting` phase before it is
//! dropped. Dismissing a notice aborts its expiry timer so the timer can never
//! remove it a second time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use mockable::Clock;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::warn;

/// Timing of notice expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoticeConfig {
    /// How long a notice stays fully visible.
    pub visible_for: Duration,
    /// How long the exit transition lasts before removal.
    pub exit_transition: Duration,
}

impl Default for NoticeConfig {
    fn default() -> Self {
        Self {
            visible_for: Duration::from_millis(3_000),
            exit_transition: Duration::from_millis(300),
        }
    }
}

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// An action completed.
    Success,
    /// An action failed.
    Error,
    /// Neutral information.
    Info,
}

/// Lifecycle phase of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticePhase {
    /// Fully shown.
    Visible,
    /// Leaving; removed once the exit transition ends.
    Exiting,
}

/// Identifier of a queued notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoticeId(u64);

/// One operator notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Queue-assigned identifier.
    pub id: NoticeId,
    /// Human-readable text.
    pub message: String,
    /// Severity.
    pub kind: NoticeKind,
    /// When the notice was raised.
    pub created_at: DateTime<Utc>,
    /// Current phase.
    pub phase: NoticePhase,
}

struct Inner {
    clock: Arc<dyn Clock>,
    config: NoticeConfig,
    next_id: AtomicU64,
    notices: watch::Sender<Vec<Notice>>,
    timers: Mutex<HashMap<NoticeId, AbortHandle>>,
}

impl Inner {
    fn timers(&self) -> std::sync::MutexGuard<'_, HashMap<NoticeId, AbortHandle>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mark_exiting(&self, id: NoticeId) {
        self.notices.send_if_modified(|notices| {
            notices
                .iter_mut()
                .find(|notice| notice.id == id)
                .map(|notice| notice.phase = NoticePhase::Exiting)
                .is_some()
        });
    }

    fn remove(&self, id: NoticeId) -> bool {
        self.notices.send_if_modified(|notices| {
            let before = notices.len();
            notices.retain(|notice| notice.id != id);
            notices.len() != before
        })
    }
}

/// Shared queue of active notices.
#[derive(Clone)]
pub struct NoticeQueue {
    inner: Arc<Inner>,
}

impl NoticeQueue {
    /// Build an empty queue.
    pub fn new(clock: Arc<dyn Clock>, config: NoticeConfig) -> Self {
        let (notices, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(Inner {
                clock,
                config,
                next_id: AtomicU64::new(1),
                notices,
                timers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Raise a notice and schedule its expiry.
    ///
    /// Outside a Tokio runtime the notice is kept until dismissed.
    pub fn push(&self, kind: NoticeKind, message: impl Into<String>) -> NoticeId {
        let id = NoticeId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let notice = Notice {
            id,
            message: message.into(),
            kind,
            created_at: self.inner.clock.utc(),
            phase: NoticePhase::Visible,
        };
        self.inner.notices.send_modify(|notices| notices.push(notice));

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(notice_id = id.0, "no runtime available; notice will not auto-expire");
            return id;
        };
        // Hold the timer map while spawning so the task cannot finish and
        // clean up before its handle is registered.
        let mut timers = self.inner.timers();
        let inner = Arc::clone(&self.inner);
        let task = runtime.spawn(async move {
            tokio::time::sleep(inner.config.visible_for).await;
            inner.mark_exiting(id);
            tokio::time::sleep(inner.config.exit_transition).await;
            inner.timers().remove(&id);
            inner.remove(id);
        });
        timers.insert(id, task.abort_handle());
        id
    }

    /// Dismiss a notice immediately, cancelling its expiry timer.
    ///
    /// Returns `false` when the notice had already gone.
    pub fn dismiss(&self, id: NoticeId) -> bool {
        if let Some(timer) = self.inner.timers().remove(&id) {
            timer.abort();
        }
        self.inner.remove(id)
    }

    /// Active notices, oldest first.
    pub fn snapshot(&self) -> Vec<Notice> {
        self.inner.notices.borrow().clone()
    }

    /// Subscribe to queue changes.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Notice>> {
        self.inner.notices.subscribe()
    }

    #[cfg(test)]
    fn pending_timers(&self) -> usize {
        self.inner.timers().len()
    }
}
