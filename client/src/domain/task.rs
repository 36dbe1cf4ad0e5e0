//! Task records owned by a user.

use super::ids::{TaskId, UserId};

/// A remote task item.
///
/// Cached tasks are never mutated in place: every change produces a new value
/// through [`Task::with_completed`] or [`Task::toggled`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Stable identifier.
    pub id: TaskId,
    /// Owning user.
    pub user_id: UserId,
    /// Task description.
    pub title: String,
    /// Completion flag.
    pub completed: bool,
}

impl Task {
    /// Return a copy with the completion flag set to `completed`.
    #[must_use]
    pub fn with_completed(&self, completed: bool) -> Self {
        Self {
            completed,
            ..self.clone()
        }
    }

    /// Return a copy with the completion flag inverted.
    #[must_use]
    pub fn toggled(&self) -> Self {
        self.with_completed(!self.completed)
    }
}

/// Return a copy of `tasks` with `task` substituted for the entry sharing its
/// id. Returns `None` when no entry matches.
pub fn replace_task(tasks: &[Task], task: &Task) -> Option<Vec<Task>> {
    if !tasks.iter().any(|existing| existing.id == task.id) {
        return None;
    }
    Some(
        tasks
            .iter()
            .map(|existing| {
                if existing.id == task.id {
                    task.clone()
                } else {
                    existing.clone()
                }
            })
            .collect(),
    )
}

/// Tasks to show for the current filter.
pub fn visible_tasks(tasks: &[Task], hide_completed: bool) -> Vec<Task> {
    tasks
        .iter()
        .filter(|task| !(hide_completed && task.completed))
        .cloned()
        .collect()
}
