//! Collection cache and mutation coordinator.
//!
//! [`SyncCoordinator`] is the only component allowed to touch cached
//! collections. Reads go through single-flight, stale-while-revalidate
//! stores; task completion toggles go through the optimistic protocol:
//!
//! 1. derive the candidate from the cached task and patch it into the cached
//!    list before any network call;
//! 2. send the candidate with `update_task`;
//! 3. on success patch in the server's echo, on failure restore the whole
//!    pre-patch list;
//! 4. flag the list for refresh either way and raise a notice.
//!
//! Toggles of the same task never overlap, and toggles within one user's
//! list run one after another so a rollback can only restore a snapshot
//! taken after every earlier toggle settled.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use mockable::Clock;
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, watch};
use tracing::{debug, error, info};

use crate::domain::ids::{TaskId, UserId};
use crate::domain::notice::{NoticeKind, NoticeQueue};
use crate::domain::ports::FetchError;
use crate::domain::remote_client::RemoteClient;
use crate::domain::selection::SelectionState;
use crate::domain::task::{Task, replace_task, visible_tasks};
use crate::domain::user::User;

mod cache;

pub use cache::{CacheEntry, CacheKey, CacheStatus, CollectionStore};
use cache::MutationRejected;

/// Cache tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Age after which ready data is refreshed in the background.
    pub stale_after: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(300),
        }
    }
}

/// Errors returned by [`SyncCoordinator::toggle_task`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToggleError {
    /// Another toggle of the same task has not settled yet.
    #[error("task {task_id} already has an update in flight")]
    AlreadyPending {
        /// Task being toggled.
        task_id: TaskId,
    },
    /// The owning user's tasks are not cached.
    #[error("{key} is not loaded")]
    NotLoaded {
        /// Cache key of the owning list.
        key: CacheKey,
    },
    /// The cached list does not contain the task.
    #[error("task {task_id} is not in the cached list")]
    UnknownTask {
        /// Task being toggled.
        task_id: TaskId,
    },
    /// The write failed; the optimistic change was rolled back.
    #[error("update failed: {0}")]
    Remote(#[from] FetchError),
}

/// Tasks for the current selection, checked against the selection that is
/// current when the fetch settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectedTasks {
    /// No user is selected.
    NoSelection,
    /// Visible tasks of the still-selected user.
    Loaded {
        /// Selected user.
        user: UserId,
        /// Tasks left after the completion filter.
        tasks: Vec<Task>,
    },
    /// The selection changed while the fetch was running; the result was
    /// cached but must not be shown.
    Superseded {
        /// User the fetch was issued for.
        requested: UserId,
    },
}

/// Removes a task from the pending set when the toggle settles.
struct PendingToggle<'a> {
    pending: &'a Mutex<HashSet<TaskId>>,
    task_id: TaskId,
}

impl<'a> PendingToggle<'a> {
    fn claim(pending: &'a Mutex<HashSet<TaskId>>, task_id: TaskId) -> Option<Self> {
        lock(pending)
            .insert(task_id)
            .then_some(Self { pending, task_id })
    }
}

impl Drop for PendingToggle<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(&self.task_id);
    }
}

type ListLocks = Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>;

/// Holds one user's list lock and drops the map entry once no other toggle
/// holds or awaits it.
struct ListLease<'a> {
    locks: &'a ListLocks,
    user: UserId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<'a> ListLease<'a> {
    async fn acquire(locks: &'a ListLocks, user: UserId) -> ListLease<'a> {
        let list_lock = Arc::clone(lock(locks).entry(user).or_default());
        let guard = list_lock.lock_owned().await;
        Self {
            locks,
            user,
            guard: Some(guard),
        }
    }
}

impl Drop for ListLease<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = lock(self.locks);
        if locks
            .get(&self.user)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(&self.user);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owner of the fetch/cache/mutate lifecycle.
pub struct SyncCoordinator {
    client: RemoteClient,
    users: CollectionStore<User>,
    tasks: CollectionStore<Task>,
    selection: watch::Receiver<SelectionState>,
    notices: NoticeQueue,
    pending: Mutex<HashSet<TaskId>>,
    list_locks: ListLocks,
}

impl SyncCoordinator {
    /// Build a coordinator over `client`, following `selection` for the
    /// relevance check of [`Self::selected_tasks`].
    pub fn new(
        client: RemoteClient,
        selection: watch::Receiver<SelectionState>,
        notices: NoticeQueue,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> Self {
        Self {
            client,
            users: CollectionStore::new(Arc::clone(&clock), config.stale_after),
            tasks: CollectionStore::new(clock, config.stale_after),
            selection,
            notices,
            pending: Mutex::new(HashSet::new()),
            list_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Users sorted by name, from cache when possible.
    ///
    /// # Errors
    ///
    /// Returns the [`FetchError`] of the fetch or of a failed entry.
    pub async fn users(&self) -> Result<Vec<User>, FetchError> {
        let client = self.client.clone();
        self.users
            .read(CacheKey::Users, move || async move { client.list_users().await })
            .await
    }

    /// Tasks of `user` sorted by id, from cache when possible.
    ///
    /// # Errors
    ///
    /// Returns the [`FetchError`] of the fetch or of a failed entry.
    pub async fn tasks_for(&self, user: UserId) -> Result<Vec<Task>, FetchError> {
        let client = self.client.clone();
        self.tasks
            .read(CacheKey::Tasks(user), move || async move {
                client.list_tasks_for_user(user).await
            })
            .await
    }

    /// Visible tasks of the selected user.
    ///
    /// The outcome is discarded as [`SelectedTasks::Superseded`] when the
    /// selection moved to another user while the fetch was running, even if
    /// the fetch failed.
    ///
    /// # Errors
    ///
    /// Returns the [`FetchError`] of the fetch when the selection is still
    /// current.
    pub async fn selected_tasks(&self) -> Result<SelectedTasks, FetchError> {
        let Some(user) = self.selection.borrow().selected_user() else {
            return Ok(SelectedTasks::NoSelection);
        };
        let fetched = self.tasks_for(user).await;

        let current = *self.selection.borrow();
        if current.selected_user() != Some(user) {
            debug!(user_id = user.get(), "dropping tasks for a superseded selection");
            return Ok(SelectedTasks::Superseded { requested: user });
        }
        let tasks = fetched?;
        Ok(SelectedTasks::Loaded {
            user,
            tasks: visible_tasks(&tasks, current.hide_completed()),
        })
    }

    /// Re-run the fetch for `key` and wait for it.
    ///
    /// # Errors
    ///
    /// Returns the [`FetchError`] of the retried fetch.
    pub async fn retry_fetch(&self, key: CacheKey) -> Result<(), FetchError> {
        let client = self.client.clone();
        match key {
            CacheKey::Users => {
                self.users
                    .retry(key, move || async move { client.list_users().await })
                    .await?;
            }
            CacheKey::Tasks(user) => {
                self.tasks
                    .retry(key, move || async move {
                        client.list_tasks_for_user(user).await
                    })
                    .await?;
            }
        }
        Ok(())
    }

    /// Flag `key` so its next read refreshes in the background.
    pub fn invalidate(&self, key: CacheKey) {
        match key {
            CacheKey::Users => self.users.invalidate(key),
            CacheKey::Tasks(_) => self.tasks.invalidate(key),
        }
    }

    /// Current users entry.
    pub fn users_entry(&self) -> CacheEntry<User> {
        self.users.entry(CacheKey::Users)
    }

    /// Current tasks entry of `user`.
    pub fn tasks_entry(&self, user: UserId) -> CacheEntry<Task> {
        self.tasks.entry(CacheKey::Tasks(user))
    }

    /// Notices raised by mutations.
    pub fn notices(&self) -> &NoticeQueue {
        &self.notices
    }

    /// Invert the completion flag of `task` optimistically.
    ///
    /// The candidate is derived from the cached copy of the task, identified
    /// by `task.id` in the list of `task.user_id`. Returns the server's echo
    /// once it has replaced the candidate in the cache.
    ///
    /// # Errors
    ///
    /// - [`ToggleError::AlreadyPending`] while an earlier toggle of the same
    ///   task is unsettled; nothing is changed.
    /// - [`ToggleError::NotLoaded`] / [`ToggleError::UnknownTask`] when there
    ///   is no cached task to toggle; nothing is changed.
    /// - [`ToggleError::Remote`] when the write failed; the list has been
    ///   restored to its pre-toggle value and an error notice raised.
    pub async fn toggle_task(&self, task: &Task) -> Result<Task, ToggleError> {
        let Some(_pending) = PendingToggle::claim(&self.pending, task.id) else {
            return Err(ToggleError::AlreadyPending { task_id: task.id });
        };
        let _serialized = ListLease::acquire(&self.list_locks, task.user_id).await;

        let key = CacheKey::Tasks(task.user_id);
        let (snapshot, candidate) = self
            .tasks
            .begin_mutation(key, |tasks| {
                let next = tasks.iter().find(|cached| cached.id == task.id)?.toggled();
                let patched = replace_task(tasks, &next)?;
                Some((patched, next))
            })
            .map_err(|rejected| match rejected {
                MutationRejected::NotLoaded => ToggleError::NotLoaded { key },
                MutationRejected::NotApplicable => ToggleError::UnknownTask { task_id: task.id },
            })?;
        debug!(%key, task_id = task.id.get(), completed = candidate.completed, "sending optimistic toggle");

        let outcome = self
            .client
            .update_task(&candidate)
            .await
            .and_then(|echo| check_echo(&candidate, echo));
        match outcome {
            Ok(echo) => {
                self.tasks
                    .commit_mutation(key, |tasks| replace_task(tasks, &echo));
                info!(%key, task_id = echo.id.get(), completed = echo.completed, "task update confirmed");
                self.notices.push(NoticeKind::Info, confirmed_message(&echo));
                Ok(echo)
            }
            Err(failure) => {
                self.tasks.rollback_mutation(key, snapshot);
                error!(%key, task_id = candidate.id.get(), error = %failure, "task update rolled back");
                self.notices.push(
                    NoticeKind::Error,
                    format!(
                        "Could not update \"{}\". {}",
                        candidate.title,
                        failure.user_message()
                    ),
                );
                Err(ToggleError::Remote(failure))
            }
        }
    }

    #[cfg(test)]
    fn tracked_list_locks(&self) -> usize {
        lock(&self.list_locks).len()
    }
}

/// The echo replaces the candidate, so it must describe the same task.
fn check_echo(candidate: &Task, echo: Task) -> Result<Task, FetchError> {
    if echo.id != candidate.id || echo.user_id != candidate.user_id {
        return Err(FetchError::validation(
            "$",
            format!(
                "echoed task {}/{} does not match request {}/{}",
                echo.user_id, echo.id, candidate.user_id, candidate.id
            ),
        ));
    }
    Ok(echo)
}

fn confirmed_message(echo: &Task) -> String {
    let state = if echo.completed { "complete" } else { "incomplete" };
    format!(
        "\"{}\" marked {state}. The demo API does not store changes, so this will not survive a refresh.",
        echo.title
    )
}
