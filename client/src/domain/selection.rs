//! Selection state persisted in the page address.
//!
//! [`SelectionState`] is a plain value with pure transition functions. It has
//! two independent axes (selected user, hide-completed filter) and exactly one
//! cross-cutting rule: selecting a *different* user forces the filter off in
//! the same transition.
//!
//! [`PersistedSelection`] is the only place that reads or writes the address
//! bar. Every mutator re-derives the current state from the address, applies
//! one transition, writes the result back with a single `replace`, and then
//! publishes it to subscribers.

use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;
use url::Url;

use super::ids::UserId;
use super::ports::{AddressBar, AddressBarError};

/// Query parameter carrying the selected user id.
pub const SELECTED_USER_PARAM: &str = "selectedUser";
/// Query parameter carrying the hide-completed flag.
pub const HIDE_COMPLETED_PARAM: &str = "hideCompleted";

/// Selected user and completion filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectionState {
    selected_user: Option<UserId>,
    hide_completed: bool,
}

impl SelectionState {
    /// Build a state from its parts.
    pub const fn new(selected_user: Option<UserId>, hide_completed: bool) -> Self {
        Self {
            selected_user,
            hide_completed,
        }
    }

    /// Currently selected user, if any.
    pub const fn selected_user(&self) -> Option<UserId> {
        self.selected_user
    }

    /// Whether completed tasks are hidden.
    pub const fn hide_completed(&self) -> bool {
        self.hide_completed
    }

    /// Select `user`. Switching to a different user clears the filter;
    /// re-selecting the current user changes nothing.
    #[must_use]
    pub fn select(self, user: UserId) -> Self {
        if self.selected_user == Some(user) {
            return self;
        }
        Self::new(Some(user), false)
    }

    /// Clear both selection and filter.
    #[must_use]
    pub const fn cleared(self) -> Self {
        Self::new(None, false)
    }

    /// Set the filter, leaving the selection alone.
    #[must_use]
    pub const fn with_hide_completed(self, hide_completed: bool) -> Self {
        Self::new(self.selected_user, hide_completed)
    }

    /// Invert the filter, leaving the selection alone.
    #[must_use]
    pub const fn toggle_hide_completed(self) -> Self {
        self.with_hide_completed(!self.hide_completed)
    }

    /// Derive state from a location.
    ///
    /// A missing or non-positive-integer `selectedUser` means no selection;
    /// `hideCompleted` is on only for the exact text `true`. When a parameter
    /// repeats, the first occurrence wins.
    pub fn from_location(location: &Url) -> Self {
        let mut selected_user: Option<Option<UserId>> = None;
        let mut hide_completed: Option<bool> = None;
        for (key, value) in location.query_pairs() {
            match &*key {
                SELECTED_USER_PARAM if selected_user.is_none() => {
                    selected_user = Some(UserId::parse_untrusted(&value));
                }
                HIDE_COMPLETED_PARAM if hide_completed.is_none() => {
                    hide_completed = Some(value == "true");
                }
                _ => {}
            }
        }
        Self::new(selected_user.flatten(), hide_completed.unwrap_or(false))
    }

    /// Return `location` with this state written into its query.
    ///
    /// Unrelated parameters keep their order; the two selection parameters
    /// are appended, and omitted when they hold their default.
    pub fn write_to(&self, location: &Url) -> Url {
        let others: Vec<(String, String)> = location
            .query_pairs()
            .filter(|(key, _)| &**key != SELECTED_USER_PARAM && &**key != HIDE_COMPLETED_PARAM)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        let mut next = location.clone();
        next.set_query(None);
        let selected = self.selected_user.map(|user| user.to_string());
        if !others.is_empty() || selected.is_some() || self.hide_completed {
            let mut pairs = next.query_pairs_mut();
            pairs.extend_pairs(others);
            if let Some(user) = selected {
                pairs.append_pair(SELECTED_USER_PARAM, &user);
            }
            if self.hide_completed {
                pairs.append_pair(HIDE_COMPLETED_PARAM, "true");
            }
        }
        next
    }
}

/// Errors raised by [`PersistedSelection`] mutators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// The address bar could not be read or written; state is unchanged.
    #[error("selection could not be persisted: {0}")]
    Persist(#[from] AddressBarError),
}

/// Address-bar backed selection state.
pub struct PersistedSelection {
    address_bar: Arc<dyn AddressBar>,
    state: watch::Sender<SelectionState>,
    write_lock: Mutex<()>,
}

impl PersistedSelection {
    /// Derive the initial state from the address bar.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::Persist`] when the address bar cannot be read.
    pub fn load(address_bar: Arc<dyn AddressBar>) -> Result<Self, SelectionError> {
        let initial = SelectionState::from_location(&address_bar.location()?);
        let (state, _) = watch::channel(initial);
        Ok(Self {
            address_bar,
            state,
            write_lock: Mutex::new(()),
        })
    }

    /// Latest published state.
    pub fn current(&self) -> SelectionState {
        *self.state.borrow()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<SelectionState> {
        self.state.subscribe()
    }

    /// Select `user`, clearing the filter when the user changes.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::Persist`] when the address bar write fails.
    pub fn select(&self, user: UserId) -> Result<SelectionState, SelectionError> {
        self.transition(|state| state.select(user))
    }

    /// Clear selection and filter.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::Persist`] when the address bar write fails.
    pub fn clear(&self) -> Result<SelectionState, SelectionError> {
        self.transition(SelectionState::cleared)
    }

    /// Invert the hide-completed filter.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::Persist`] when the address bar write fails.
    pub fn toggle_hide_completed(&self) -> Result<SelectionState, SelectionError> {
        self.transition(SelectionState::toggle_hide_completed)
    }

    /// Set the hide-completed filter.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::Persist`] when the address bar write fails.
    pub fn set_hide_completed(&self, hide_completed: bool) -> Result<SelectionState, SelectionError> {
        self.transition(|state| state.with_hide_completed(hide_completed))
    }

    /// Re-derive the state after the address changed underneath us.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::Persist`] when the address bar cannot be read.
    pub fn reload(&self) -> Result<SelectionState, SelectionError> {
        self.transition(|state| state)
    }

    fn transition(
        &self,
        apply: impl FnOnce(SelectionState) -> SelectionState,
    ) -> Result<SelectionState, SelectionError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let location = self.address_bar.location()?;
        let current = SelectionState::from_location(&location);
        let next = apply(current);
        if next != current {
            self.address_bar.replace(&next.write_to(&location))?;
            debug!(
                selected_user = ?next.selected_user(),
                hide_completed = next.hide_completed(),
                "selection persisted"
            );
        }
        self.state.send_if_modified(|published| {
            if *published == next {
                return false;
            }
            *published = next;
            true
        });
        Ok(next)
    }
}
