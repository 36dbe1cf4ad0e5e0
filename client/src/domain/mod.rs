//! Domain primitives, services and ports.
//!
//! Purpose: keep the sync rules (ordering, ownership filtering, retry,
//! selection persistence, optimistic mutation) independent of HTTP and of
//! the medium that stores the page address.
//!
//! Public surface:
//! - `UserId`, `TaskId` — validated identifiers.
//! - `User`, `Task` — immutable records.
//! - `SelectionState`, `PersistedSelection` — address-backed UI state.
//! - `RemoteClient` — retrying, ordering client over the `TodoApi` port.
//! - `SyncCoordinator` — cache, single-flight reads and optimistic toggles.
//! - `NoticeQueue` — expiring operator notices.

pub mod ids;
pub mod notice;
pub mod ports;
pub mod remote_client;
pub mod selection;
pub mod sync;
pub mod task;
pub mod user;

pub use self::ids::{IdentifierValidationError, TaskId, UserId};
pub use self::notice::{Notice, NoticeConfig, NoticeId, NoticeKind, NoticePhase, NoticeQueue};
pub use self::remote_client::{RemoteClient, RetryPolicy, RetrySleeper, TokioSleeper};
pub use self::selection::{PersistedSelection, SelectionError, SelectionState};
pub use self::sync::{
    CacheEntry, CacheKey, CacheStatus, SelectedTasks, SyncConfig, SyncCoordinator, ToggleError,
};
pub use self::task::{Task, visible_tasks};
pub use self::user::{Address, Company, Geo, User};
