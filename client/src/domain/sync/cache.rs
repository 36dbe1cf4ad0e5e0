//! Keyed collection cache with single-flight fetches.
//!
//! Each [`CacheKey`] owns one slot. A slot holds the published
//! [`CacheEntry`], at most one in-flight fetch, a version bumped by every
//! optimistic write, and the number of optimistic writes still unsettled.
//! A fetch that completes while a write is unsettled, or after the version
//! moved, does not overwrite the data; it flags the entry for refresh
//! instead, so a late response can never clobber an optimistic value or a
//! rollback.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use mockable::Clock;
use tracing::debug;

use crate::domain::ids::UserId;
use crate::domain::ports::FetchError;

/// Identity of one cached collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// The users collection.
    Users,
    /// The tasks of one user.
    Tasks(UserId),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Users => f.write_str("users"),
            Self::Tasks(user) => write!(f, "tasks:{user}"),
        }
    }
}

/// Lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Never requested.
    Idle,
    /// First fetch (or retry after failure) in flight.
    Loading,
    /// Data available.
    Ready,
    /// Last fetch failed and no data is available.
    Failed,
}

/// Published view of one cache slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<T> {
    /// Key of the slot.
    pub key: CacheKey,
    /// Lifecycle state.
    pub status: CacheStatus,
    /// Cached collection, if any.
    pub data: Option<Vec<T>>,
    /// Error of the most recent failed fetch. A `Ready` entry keeps the
    /// error of a failed background refresh here while serving old data.
    pub error: Option<FetchError>,
    /// When `data` was last fetched.
    pub fetched_at: Option<DateTime<Utc>>,
    /// Whether the next read should reconcile with the server.
    pub refresh_requested: bool,
    /// Whether a fetch is running for this key.
    pub revalidating: bool,
}

impl<T> CacheEntry<T> {
    fn idle(key: CacheKey) -> Self {
        Self {
            key,
            status: CacheStatus::Idle,
            data: None,
            error: None,
            fetched_at: None,
            refresh_requested: false,
            revalidating: false,
        }
    }
}

type SharedFetch<T> = Shared<BoxFuture<'static, Result<Vec<T>, FetchError>>>;

struct InFlight<T> {
    id: u64,
    future: SharedFetch<T>,
}

struct Slot<T> {
    entry: CacheEntry<T>,
    inflight: Option<InFlight<T>>,
    version: u64,
    unsettled_mutations: usize,
}

/// Why an optimistic write could not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MutationRejected {
    /// The key has no cached data to patch.
    NotLoaded,
    /// The patch function declined the cached data.
    NotApplicable,
}

struct StoreInner<T> {
    clock: Arc<dyn Clock>,
    stale_after: Duration,
    next_fetch_id: Mutex<u64>,
    slots: Mutex<HashMap<CacheKey, Slot<T>>>,
}

/// Shared cache of fetched collections of `T`.
pub struct CollectionStore<T> {
    inner: Arc<StoreInner<T>>,
}

impl<T> Clone for CollectionStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

enum ReadPlan<T> {
    Cached(Vec<T>),
    Await(SharedFetch<T>),
    Fail(FetchError),
}

impl<T> CollectionStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Build an empty store. Ready data older than `stale_after` is served
    /// as-is while a background refresh runs.
    pub fn new(clock: Arc<dyn Clock>, stale_after: Duration) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                clock,
                stale_after,
                next_fetch_id: Mutex::new(0),
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Read `key`, fetching it when nothing is cached.
    ///
    /// A read of a key whose fetch is already running joins that fetch.
    /// Ready data is returned immediately; when it is stale or flagged for
    /// refresh a background fetch is started first. A failed entry returns
    /// its error until [`Self::retry`] is called.
    ///
    /// # Errors
    ///
    /// Returns the [`FetchError`] of the fetch, or the recorded error of a
    /// failed entry.
    pub async fn read<F, Fut>(&self, key: CacheKey, fetch: F) -> Result<Vec<T>, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, FetchError>> + Send + 'static,
    {
        let plan = {
            let mut slots = self.inner.slots();
            let slot = slots.entry(key).or_insert_with(|| Slot::new(key));
            let cached = match slot.entry.status {
                CacheStatus::Ready => slot.entry.data.clone(),
                _ => None,
            };
            if let Some(data) = cached {
                if slot.inflight.is_none() && self.needs_refresh(&slot.entry) {
                    debug!(%key, "serving cached data while revalidating");
                    let _background = self.start_fetch(key, slot, fetch());
                }
                ReadPlan::Cached(data)
            } else if let Some(inflight) = &slot.inflight {
                ReadPlan::Await(inflight.future.clone())
            } else if slot.entry.status == CacheStatus::Failed {
                ReadPlan::Fail(
                    slot.entry
                        .error
                        .clone()
                        .unwrap_or_else(|| FetchError::network("fetch failed")),
                )
            } else {
                ReadPlan::Await(self.start_fetch(key, slot, fetch()))
            }
        };
        match plan {
            ReadPlan::Cached(data) => Ok(data),
            ReadPlan::Await(future) => future.await,
            ReadPlan::Fail(error) => Err(error),
        }
    }

    /// Fetch `key` again and wait for the outcome, joining a running fetch
    /// if there is one.
    ///
    /// # Errors
    ///
    /// Returns the [`FetchError`] of the fetch.
    pub async fn retry<F, Fut>(&self, key: CacheKey, fetch: F) -> Result<Vec<T>, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, FetchError>> + Send + 'static,
    {
        let future = {
            let mut slots = self.inner.slots();
            let slot = slots.entry(key).or_insert_with(|| Slot::new(key));
            match &slot.inflight {
                Some(inflight) => inflight.future.clone(),
                None => self.start_fetch(key, slot, fetch()),
            }
        };
        future.await
    }

    /// Flag `key` so the next read reconciles with the server.
    pub fn invalidate(&self, key: CacheKey) {
        if let Some(slot) = self.inner.slots().get_mut(&key) {
            slot.entry.refresh_requested = true;
        }
    }

    /// Snapshot of the entry for `key`; `Idle` when never requested.
    pub fn entry(&self, key: CacheKey) -> CacheEntry<T> {
        self.inner
            .slots()
            .get(&key)
            .map_or_else(|| CacheEntry::idle(key), |slot| slot.entry.clone())
    }

    /// Apply an optimistic patch to the data of `key`.
    ///
    /// `patch` returns the patched list plus any value it derived along the
    /// way. Returns the pre-patch snapshot for [`Self::rollback_mutation`]
    /// with that value. Every successful call must be paired with one commit
    /// or rollback.
    pub(crate) fn begin_mutation<R>(
        &self,
        key: CacheKey,
        patch: impl FnOnce(&[T]) -> Option<(Vec<T>, R)>,
    ) -> Result<(Vec<T>, R), MutationRejected> {
        let mut slots = self.inner.slots();
        let slot = slots.get_mut(&key).ok_or(MutationRejected::NotLoaded)?;
        let snapshot = slot
            .entry
            .data
            .clone()
            .ok_or(MutationRejected::NotLoaded)?;
        let (patched, derived) = patch(&snapshot).ok_or(MutationRejected::NotApplicable)?;
        slot.entry.data = Some(patched);
        slot.version += 1;
        slot.unsettled_mutations += 1;
        debug!(%key, version = slot.version, "optimistic patch applied");
        Ok((snapshot, derived))
    }

    /// Settle an optimistic write by patching in the server's answer, then
    /// flag the entry for refresh.
    pub(crate) fn commit_mutation(&self, key: CacheKey, patch: impl FnOnce(&[T]) -> Option<Vec<T>>) {
        self.settle_mutation(key, |data| {
            if let Some(patched) = data.as_deref().and_then(patch) {
                *data = Some(patched);
            }
        });
    }

    /// Settle an optimistic write by restoring `snapshot`, then flag the
    /// entry for refresh.
    pub(crate) fn rollback_mutation(&self, key: CacheKey, snapshot: Vec<T>) {
        self.settle_mutation(key, |data| *data = Some(snapshot));
    }

    fn settle_mutation(&self, key: CacheKey, apply: impl FnOnce(&mut Option<Vec<T>>)) {
        let mut slots = self.inner.slots();
        let Some(slot) = slots.get_mut(&key) else {
            return;
        };
        apply(&mut slot.entry.data);
        slot.version += 1;
        slot.unsettled_mutations = slot.unsettled_mutations.saturating_sub(1);
        slot.entry.refresh_requested = true;
        debug!(%key, version = slot.version, "optimistic patch settled");
    }

    fn needs_refresh(&self, entry: &CacheEntry<T>) -> bool {
        if entry.refresh_requested {
            return true;
        }
        entry.fetched_at.is_some_and(|fetched_at| {
            self.inner
                .clock
                .utc()
                .signed_duration_since(fetched_at)
                .to_std()
                .is_ok_and(|age| age > self.inner.stale_after)
        })
    }

    /// Spawn the fetch and register it as the key's in-flight request.
    fn start_fetch<Fut>(&self, key: CacheKey, slot: &mut Slot<T>, fetch: Fut) -> SharedFetch<T>
    where
        Fut: Future<Output = Result<Vec<T>, FetchError>> + Send + 'static,
    {
        let id = self.inner.next_fetch_id();
        let started_version = slot.version;
        let inner = Arc::clone(&self.inner);
        let future = async move {
            let result = fetch.await;
            inner.settle_fetch(key, id, started_version, result)
        }
        .boxed()
        .shared();

        if slot.entry.data.is_none() {
            slot.entry.status = CacheStatus::Loading;
        }
        slot.entry.revalidating = true;
        slot.inflight = Some(InFlight {
            id,
            future: future.clone(),
        });
        debug!(%key, fetch_id = id, "fetch started");

        // Drive the fetch to completion even if every reader goes away.
        tokio::spawn(future.clone());
        future
    }
}

impl<T: Clone> StoreInner<T> {
    fn slots(&self) -> MutexGuard<'_, HashMap<CacheKey, Slot<T>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_fetch_id(&self) -> u64 {
        let mut next = self
            .next_fetch_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *next += 1;
        *next
    }

    /// Publish a fetch outcome and return what readers should see.
    fn settle_fetch(
        &self,
        key: CacheKey,
        id: u64,
        started_version: u64,
        result: Result<Vec<T>, FetchError>,
    ) -> Result<Vec<T>, FetchError> {
        let mut slots = self.slots();
        let Some(slot) = slots.get_mut(&key) else {
            return result;
        };
        if slot.inflight.as_ref().is_some_and(|inflight| inflight.id == id) {
            slot.inflight = None;
            slot.entry.revalidating = false;
        }

        match result {
            Ok(data) => {
                if slot.unsettled_mutations > 0 || slot.version != started_version {
                    debug!(%key, fetch_id = id, "fetch overtaken by a local write; keeping local data");
                    slot.entry.refresh_requested = true;
                    return Ok(slot.entry.data.clone().unwrap_or(data));
                }
                slot.entry.status = CacheStatus::Ready;
                slot.entry.data = Some(data.clone());
                slot.entry.error = None;
                slot.entry.fetched_at = Some(self.clock.utc());
                slot.entry.refresh_requested = false;
                debug!(%key, fetch_id = id, items = data.len(), "fetch settled");
                Ok(data)
            }
            Err(error) => {
                if slot.entry.data.is_some() {
                    slot.entry.status = CacheStatus::Ready;
                    debug!(%key, fetch_id = id, %error, "refresh failed; keeping cached data");
                } else {
                    slot.entry.status = CacheStatus::Failed;
                    debug!(%key, fetch_id = id, %error, "fetch failed");
                }
                slot.entry.error = Some(error.clone());
                Err(error)
            }
        }
    }
}

impl<T> Slot<T> {
    fn new(key: CacheKey) -> Self {
        Self {
            entry: CacheEntry::idle(key),
            inflight: None,
            version: 0,
            unsettled_mutations: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    //! Single-flight reads, staleness and mutation bookkeeping.
    use super::*;
    use crate::test_support::MutableClock;
    use chrono::TimeZone;
    use rstest::{fixture, rstest};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn user(raw: u64) -> UserId {
        UserId::new(raw).expect("valid user id")
    }

    #[fixture]
    fn clock() -> Arc<MutableClock> {
        let start = Utc
            .with_ymd_and_hms(2026, 10, 19, 9, 0, 0)
            .single()
            .expect("valid time");
        Arc::new(MutableClock::new(start))
    }

    fn store(clock: &Arc<MutableClock>) -> CollectionStore<u32> {
        CollectionStore::new(clock.clone(), Duration::from_secs(300))
    }

    #[rstest]
    fn keys_render_as_resource_and_selector() {
        assert_eq!(CacheKey::Users.to_string(), "users");
        assert_eq!(CacheKey::Tasks(user(4)).to_string(), "tasks:4");
    }

    #[rstest]
    #[tokio::test]
    async fn concurrent_reads_share_one_fetch(clock: Arc<MutableClock>) {
        let store = store(&clock);
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());
        let key = CacheKey::Tasks(user(3));

        let fetch = || {
            let calls = calls.clone();
            let gate = gate.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                gate.notified().await;
                Ok(vec![1, 2])
            }
        };
        let first = store.read(key, fetch);
        let second = store.read(key, fetch);
        let release = async {
            tokio::task::yield_now().await;
            assert_eq!(store.entry(key).status, CacheStatus::Loading);
            gate.notify_one();
        };

        let (first, second, ()) = tokio::join!(first, second, release);

        assert_eq!(first.expect("first read"), vec![1, 2]);
        assert_eq!(second.expect("second read"), vec![1, 2]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.entry(key).status, CacheStatus::Ready);
    }

    #[rstest]
    #[tokio::test]
    async fn stale_data_is_served_while_revalidating(clock: Arc<MutableClock>) {
        let store = store(&clock);
        store
            .read(CacheKey::Users, || async { Ok(vec![1]) })
            .await
            .expect("initial read");

        clock.advance(Duration::from_secs(301));
        let gate = Arc::new(Notify::new());
        let waiter = gate.clone();
        let served = store
            .read(CacheKey::Users, move || async move {
                waiter.notified().await;
                Ok(vec![1, 2])
            })
            .await
            .expect("stale read");

        assert_eq!(served, vec![1], "stale value served without blocking");
        assert!(store.entry(CacheKey::Users).revalidating);

        gate.notify_one();
        let refreshed = store
            .retry(CacheKey::Users, || async { Ok(vec![9]) })
            .await
            .expect("join background refresh");
        assert_eq!(refreshed, vec![1, 2]);
        assert_eq!(store.entry(CacheKey::Users).data, Some(vec![1, 2]));
    }

    #[rstest]
    #[tokio::test]
    async fn fresh_data_is_not_refetched(clock: Arc<MutableClock>) {
        let store = store(&clock);
        store
            .read(CacheKey::Users, || async { Ok(vec![1]) })
            .await
            .expect("initial read");
        clock.advance(Duration::from_secs(299));

        let served = store
            .read(CacheKey::Users, || async {
                Err(FetchError::network("fresh data must not trigger a fetch"))
            })
            .await
            .expect("cached read");

        assert_eq!(served, vec![1]);
        assert!(!store.entry(CacheKey::Users).revalidating);
    }

    #[rstest]
    #[tokio::test]
    async fn failed_entry_reports_error_until_retried(clock: Arc<MutableClock>) {
        let store = store(&clock);
        let error = store
            .read(CacheKey::Users, || async { Err(FetchError::server_fault(503, "busy")) })
            .await
            .expect_err("first read fails");
        assert_eq!(store.entry(CacheKey::Users).status, CacheStatus::Failed);

        let again = store
            .read(CacheKey::Users, || async { Ok(vec![5]) })
            .await
            .expect_err("failed entry does not refetch on read");
        assert_eq!(again, error);

        let recovered = store
            .retry(CacheKey::Users, || async { Ok(vec![5]) })
            .await
            .expect("retry succeeds");
        assert_eq!(recovered, vec![5]);
        let entry = store.entry(CacheKey::Users);
        assert_eq!(entry.status, CacheStatus::Ready);
        assert_eq!(entry.error, None);
    }

    #[rstest]
    #[tokio::test]
    async fn failed_refresh_keeps_cached_data(clock: Arc<MutableClock>) {
        let store = store(&clock);
        store
            .read(CacheKey::Users, || async { Ok(vec![1]) })
            .await
            .expect("initial read");

        store
            .retry(CacheKey::Users, || async { Err(FetchError::network("reset")) })
            .await
            .expect_err("refresh fails");

        let entry = store.entry(CacheKey::Users);
        assert_eq!(entry.status, CacheStatus::Ready);
        assert_eq!(entry.data, Some(vec![1]));
        assert_eq!(entry.error, Some(FetchError::network("reset")));
    }

    #[rstest]
    #[tokio::test]
    async fn fetch_settling_during_a_mutation_keeps_local_data(clock: Arc<MutableClock>) {
        let store = store(&clock);
        let key = CacheKey::Tasks(user(1));
        store
            .read(key, || async { Ok(vec![1, 2]) })
            .await
            .expect("initial read");

        let (snapshot, len) = store
            .begin_mutation(key, |data| {
                Some((data.iter().map(|n| n * 10).collect(), data.len()))
            })
            .expect("mutation starts");
        assert_eq!(len, 2);
        let settled = store
            .retry(key, || async { Ok(vec![7]) })
            .await
            .expect("refresh completes");

        assert_eq!(settled, vec![10, 20], "readers see local data");
        store.rollback_mutation(key, snapshot);
        let entry = store.entry(key);
        assert_eq!(entry.data, Some(vec![1, 2]));
        assert!(entry.refresh_requested);
    }

    #[rstest]
    fn mutation_requires_cached_data(clock: Arc<MutableClock>) {
        let store = store(&clock);
        let rejected = store.begin_mutation(CacheKey::Users, |data| Some((data.to_vec(), ())));
        assert_eq!(rejected, Err(MutationRejected::NotLoaded));
    }

    #[rstest]
    #[tokio::test]
    async fn invalidated_entry_refreshes_on_next_read(clock: Arc<MutableClock>) {
        let store = store(&clock);
        store
            .read(CacheKey::Users, || async { Ok(vec![1]) })
            .await
            .expect("initial read");
        store.invalidate(CacheKey::Users);

        let served = store
            .read(CacheKey::Users, || async { Ok(vec![2]) })
            .await
            .expect("read after invalidate");
        assert_eq!(served, vec![1]);

        let refreshed = store
            .retry(CacheKey::Users, || async { Ok(vec![3]) })
            .await
            .expect("join refresh");
        assert_eq!(refreshed, vec![2]);
        assert!(!store.entry(CacheKey::Users).refresh_requested);
    }
}
