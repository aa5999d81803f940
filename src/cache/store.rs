//! In-memory cache store.
//!
//! The store exclusively owns every [`CacheEntry`]. Readers get cloned
//! snapshots taken under the store lock, so a partially written entry is
//! never observable. Alongside each entry the store keeps the bookkeeping the
//! query engine needs to make its decisions atomically: live subscriptions,
//! the in-flight request, and invalidation ordering.

use futures::future::{BoxFuture, Shared};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use super::entry::CacheEntry;
use super::key::QueryKey;
use super::options::QueryOptions;
use super::traits::QueryStatus;
use crate::error::ApiError;

/// Type-erased fetch function producing a JSON payload.
pub(crate) type Fetcher =
  Arc<dyn Fn() -> BoxFuture<'static, Result<Value, ApiError>> + Send + Sync>;

/// A fetch that any number of callers can await.
pub(crate) type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

/// Result of one fetch request.
#[derive(Debug, Clone)]
pub(crate) struct FetchOutcome {
  pub result: Result<Arc<Value>, ApiError>,
  /// False when the response was discarded (key evicted or request superseded)
  pub applied: bool,
}

/// What a mounted subscriber wants run when its entry is invalidated.
#[derive(Clone)]
pub(crate) struct Refetch {
  pub fetcher: Fetcher,
  pub options: QueryOptions,
}

/// How a fetch request should treat existing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClaimMode {
  /// Serve fresh data, otherwise join or start a fetch
  Normal,
  /// Skip the freshness check
  Force,
  /// Refetch scheduled by invalidation; no-op if someone already started one
  Scheduled,
}

/// Decision taken by [`CacheStore::claim`].
pub(crate) enum Claim {
  Fresh(CacheEntry),
  /// A scheduled refetch whose key was evicted before it ran
  Evicted,
  Join(SharedFetch),
  Started(SharedFetch),
}

/// Result of applying a fetch completion.
pub(crate) struct Completion {
  pub applied: bool,
  /// Entry has no subscribers and is now subject to idle eviction
  pub idle: bool,
}

/// Outcome of [`CacheStore::mark_stale`].
pub struct StaleMark {
  /// Every key that matched the prefix
  pub matched: Vec<QueryKey>,
  /// Keys with subscribers whose refetch must be scheduled now
  pub(crate) refetch: Vec<(QueryKey, Refetch)>,
}

impl StaleMark {
  /// Keys that need an immediate refetch.
  pub fn refetch_keys(&self) -> impl Iterator<Item = &QueryKey> {
    self.refetch.iter().map(|(key, _)| key)
  }
}

/// A binding between a consumer and a key.
///
/// The receiver yields every change to the entry.
pub struct SubscriptionHandle {
  key: QueryKey,
  id: u64,
  receiver: watch::Receiver<CacheEntry>,
}

impl SubscriptionHandle {
  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  pub fn receiver(&self) -> &watch::Receiver<CacheEntry> {
    &self.receiver
  }

  pub fn receiver_mut(&mut self) -> &mut watch::Receiver<CacheEntry> {
    &mut self.receiver
  }
}

impl std::fmt::Debug for SubscriptionHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SubscriptionHandle")
      .field("key", &self.key)
      .field("id", &self.id)
      .finish_non_exhaustive()
  }
}

struct InFlight {
  /// Store epoch when the request started, unique across slot lifetimes
  id: u64,
  result: SharedFetch,
}

struct Slot {
  entry: CacheEntry,
  notify: watch::Sender<CacheEntry>,
  subscribers: HashSet<u64>,
  inflight: Option<InFlight>,
  /// Id of the most recently started request; only its response is applied
  last_request: u64,
  /// Store epoch of the most recent invalidation
  invalidated_epoch: u64,
  /// A scheduled refetch exists that has not started yet
  refetch_pending: bool,
  refetch: Option<Refetch>,
  idle_since: Option<Instant>,
}

impl Slot {
  fn new(now: Instant) -> Self {
    let entry = CacheEntry::default();
    let (notify, _) = watch::channel(entry.clone());
    Self {
      entry,
      notify,
      subscribers: HashSet::new(),
      inflight: None,
      last_request: 0,
      invalidated_epoch: 0,
      refetch_pending: false,
      refetch: None,
      idle_since: Some(now),
    }
  }

  fn publish(&mut self) {
    self.entry.subscriber_count = self.subscribers.len();
    self.notify.send_replace(self.entry.clone());
  }

  fn is_evictable(&self, now: Instant, gc_time: Duration) -> bool {
    self.subscribers.is_empty()
      && self.inflight.is_none()
      && !self.refetch_pending
      && self
        .idle_since
        .and_then(|since| since.checked_add(gc_time))
        .is_some_and(|deadline| now >= deadline)
  }
}

#[derive(Default)]
struct Inner {
  slots: HashMap<QueryKey, Slot>,
  /// Orders request starts against invalidations; also the source of request ids
  epoch: u64,
  next_subscriber: u64,
}

/// Keyed store of cache entries. Cloning yields another handle to the same store.
#[derive(Clone, Default)]
pub struct CacheStore {
  inner: Arc<Mutex<Inner>>,
}

impl CacheStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    // Entries are replaced whole, so a poisoned lock still guards consistent data
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Snapshot of the entry for `key`.
  pub fn get(&self, key: &QueryKey) -> Option<CacheEntry> {
    self.lock().slots.get(key).map(|slot| slot.entry.clone())
  }

  /// Replace the entry for `key`. Subscriber bookkeeping is kept.
  ///
  /// Returns true when the entry has no subscribers and is subject to idle eviction.
  pub fn set(&self, key: &QueryKey, entry: CacheEntry) -> bool {
    self.update(key, |current| *current = entry)
  }

  /// Modify the entry for `key` in place, creating it if needed.
  ///
  /// Returns true when the entry has no subscribers; its idle window restarts.
  pub fn update(&self, key: &QueryKey, f: impl FnOnce(&mut CacheEntry)) -> bool {
    let now = Instant::now();
    let mut inner = self.lock();
    let slot = inner
      .slots
      .entry(key.clone())
      .or_insert_with(|| Slot::new(now));
    f(&mut slot.entry);
    let idle = slot.subscribers.is_empty();
    if idle {
      slot.idle_since = Some(now);
    }
    slot.publish();
    idle
  }

  /// Mark every entry whose key equals or extends `prefix` as stale.
  ///
  /// Entries with subscribers are reported for an immediate refetch unless a
  /// refetch is already scheduled and not yet started.
  pub fn mark_stale(&self, prefix: &QueryKey) -> StaleMark {
    let mut guard = self.lock();
    let Inner { slots, epoch, .. } = &mut *guard;

    let mut matched = Vec::new();
    let mut refetch = Vec::new();

    for (key, slot) in slots.iter_mut().filter(|(key, _)| key.starts_with(prefix)) {
      *epoch += 1;
      slot.invalidated_epoch = *epoch;
      slot.entry.invalidated = true;
      slot.publish();
      matched.push(key.clone());

      if slot.subscribers.is_empty() || slot.refetch_pending {
        continue;
      }
      if let Some(scheduled) = &slot.refetch {
        slot.refetch_pending = true;
        refetch.push((key.clone(), scheduled.clone()));
      }
    }

    StaleMark { matched, refetch }
  }

  /// Register a subscriber for `key`, creating the entry if needed.
  pub fn subscribe(&self, key: &QueryKey) -> SubscriptionHandle {
    self.subscribe_with(key, None)
  }

  pub(crate) fn subscribe_with(&self, key: &QueryKey, refetch: Option<Refetch>) -> SubscriptionHandle {
    let now = Instant::now();
    let mut guard = self.lock();
    let Inner {
      slots,
      next_subscriber,
      ..
    } = &mut *guard;

    *next_subscriber += 1;
    let id = *next_subscriber;

    let slot = slots.entry(key.clone()).or_insert_with(|| Slot::new(now));
    slot.subscribers.insert(id);
    slot.idle_since = None;
    if refetch.is_some() {
      slot.refetch = refetch;
    }
    let receiver = slot.notify.subscribe();
    slot.publish();

    SubscriptionHandle {
      key: key.clone(),
      id,
      receiver,
    }
  }

  /// Remove a subscription. Returns true when the entry just became idle.
  pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
    let now = Instant::now();
    let mut inner = self.lock();
    let Some(slot) = inner.slots.get_mut(&handle.key) else {
      return false;
    };
    if !slot.subscribers.remove(&handle.id) {
      return false;
    }

    let idle = slot.subscribers.is_empty();
    if idle {
      slot.idle_since = Some(now);
      slot.refetch = None;
    }
    slot.publish();
    idle
  }

  /// Decide, atomically, whether a request is served from cache, joins the
  /// in-flight fetch, or starts a new one. `start` builds the fetch future
  /// from the new request id; it must not run anything.
  ///
  /// Request ids come from the store epoch, so an id is never handed out twice,
  /// even to a slot recreated after eviction.
  pub(crate) fn claim(
    &self,
    key: &QueryKey,
    mode: ClaimMode,
    options: &QueryOptions,
    now: Instant,
    start: impl FnOnce(u64) -> SharedFetch,
  ) -> Claim {
    let mut guard = self.lock();
    let Inner { slots, epoch, .. } = &mut *guard;
    if mode == ClaimMode::Scheduled && !slots.contains_key(key) {
      return Claim::Evicted;
    }
    let slot = slots.entry(key.clone()).or_insert_with(|| Slot::new(now));

    match mode {
      ClaimMode::Scheduled if !slot.refetch_pending => {
        // Someone already started a fetch after the invalidation
        return match &slot.inflight {
          Some(inflight) => Claim::Join(inflight.result.clone()),
          None => Claim::Fresh(slot.entry.clone()),
        };
      }
      ClaimMode::Normal if slot.entry.is_fresh(options.stale_time, now) => {
        return Claim::Fresh(slot.entry.clone());
      }
      _ => {}
    }

    // A fetch that started before the latest invalidation may carry
    // pre-mutation data, so it is superseded instead of joined
    if let Some(inflight) = &slot.inflight {
      if inflight.id > slot.invalidated_epoch {
        return Claim::Join(inflight.result.clone());
      }
    }

    *epoch += 1;
    let id = *epoch;
    slot.last_request = id;

    let result = start(id);
    slot.inflight = Some(InFlight {
      id,
      result: result.clone(),
    });
    slot.refetch_pending = false;
    slot.entry.status = QueryStatus::Loading;
    slot.publish();

    Claim::Started(result)
  }

  /// Whether request `id` is still the latest for `key`.
  pub(crate) fn is_current(&self, key: &QueryKey, id: u64) -> bool {
    self
      .lock()
      .slots
      .get(key)
      .is_some_and(|slot| slot.last_request == id)
  }

  /// The fetch currently in flight for `key`, if any.
  pub(crate) fn in_flight(&self, key: &QueryKey) -> Option<SharedFetch> {
    self
      .lock()
      .slots
      .get(key)
      .and_then(|slot| slot.inflight.as_ref())
      .map(|inflight| inflight.result.clone())
  }

  pub fn is_fetching(&self, key: &QueryKey) -> bool {
    self
      .lock()
      .slots
      .get(key)
      .is_some_and(|slot| slot.inflight.is_some())
  }

  /// Apply the response of request `id`.
  ///
  /// Responses for evicted keys and for superseded requests are discarded.
  pub(crate) fn complete(
    &self,
    key: &QueryKey,
    id: u64,
    result: &Result<Arc<Value>, ApiError>,
    stale_time: Duration,
    now: Instant,
  ) -> Completion {
    let mut inner = self.lock();
    let Some(slot) = inner.slots.get_mut(key) else {
      debug!(key = %key, "discarding response for evicted key");
      return Completion {
        applied: false,
        idle: false,
      };
    };
    if slot.last_request != id {
      debug!(key = %key, request = id, latest = slot.last_request, "discarding superseded response");
      return Completion {
        applied: false,
        idle: false,
      };
    }

    slot.inflight = None;
    match result {
      Ok(value) => {
        slot.entry.data = Some(Arc::clone(value));
        slot.entry.status = QueryStatus::Success;
        slot.entry.error = None;
        slot.entry.fetched_at = Some(chrono::Utc::now());
        slot.entry.updated_at = Some(now);
        slot.entry.stale_at = now.checked_add(stale_time);
        // Invalidated while this request was in flight: keep the data, stay stale
        slot.entry.invalidated = slot.invalidated_epoch > id;
      }
      Err(error) => {
        slot.entry.status = QueryStatus::Error;
        slot.entry.error = Some(error.clone());
      }
    }

    let idle = slot.subscribers.is_empty();
    if idle {
      slot.idle_since = Some(now);
    }
    slot.publish();

    Completion { applied: true, idle }
  }

  /// Drop a scheduled refetch that could not be started.
  pub(crate) fn cancel_scheduled(&self, key: &QueryKey) {
    if let Some(slot) = self.lock().slots.get_mut(key) {
      slot.refetch_pending = false;
    }
  }

  /// Remove entries that have had no subscribers for `gc_time`.
  pub fn evict_idle(&self, now: Instant, gc_time: Duration) -> Vec<QueryKey> {
    let mut evicted = Vec::new();
    self.lock().slots.retain(|key, slot| {
      let evict = slot.is_evictable(now, gc_time);
      if evict {
        evicted.push(key.clone());
      }
      !evict
    });
    evicted
  }

  /// Remove every entry. Pending responses will be discarded.
  pub fn clear(&self) -> usize {
    let mut inner = self.lock();
    let count = inner.slots.len();
    inner.slots.clear();
    count
  }

  pub fn keys(&self) -> Vec<QueryKey> {
    self.lock().slots.keys().cloned().collect()
  }

  pub fn len(&self) -> usize {
    self.lock().slots.len()
  }

  pub fn is_empty(&self) -> bool {
    self.lock().slots.is_empty()
  }
}
