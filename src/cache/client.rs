//! Query execution engine and mutation executor.

use futures::FutureExt;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, debug_span, info, info_span, warn, Instrument};

use super::entry::CacheEntry;
use super::key::QueryKey;
use super::mutation::{MutationDescriptor, Notice, Notifier, TracingNotifier};
use super::observer::QueryObserver;
use super::options::QueryOptions;
use super::store::{
  CacheStore, Claim, ClaimMode, FetchOutcome, Fetcher, Refetch, SharedFetch, SubscriptionHandle,
};
use super::traits::{CacheSource, QueryResult, QueryStatus};
use crate::error::ApiError;

/// Default idle time before an unsubscribed entry is evicted.
pub const DEFAULT_GC_TIME: Duration = Duration::from_secs(5 * 60);

/// Entry point for cached reads and invalidating writes.
///
/// Cloning is cheap and every clone shares the same [`CacheStore`].
#[derive(Clone)]
pub struct QueryClient {
  store: CacheStore,
  defaults: QueryOptions,
  gc_time: Duration,
  notifier: Arc<dyn Notifier>,
}

impl QueryClient {
  /// Create a client with an empty store.
  pub fn new(defaults: QueryOptions) -> Self {
    Self {
      store: CacheStore::new(),
      defaults,
      gc_time: DEFAULT_GC_TIME,
      notifier: Arc::new(TracingNotifier),
    }
  }

  /// Set how long an entry without subscribers is kept.
  pub fn with_gc_time(mut self, gc_time: Duration) -> Self {
    self.gc_time = gc_time;
    self
  }

  pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
    self.notifier = notifier;
    self
  }

  pub fn store(&self) -> &CacheStore {
    &self.store
  }

  /// A copy of the default options, to be adjusted per call.
  pub fn options(&self) -> QueryOptions {
    self.defaults.clone()
  }

  pub fn gc_time(&self) -> Duration {
    self.gc_time
  }

  /// Read `key` through the cache.
  ///
  /// 1. Disabled queries return idle without touching the store
  /// 2. Fresh data is returned with no fetch
  /// 3. Otherwise the in-flight fetch for the key is joined, or a new one started
  /// 4. On failure the previous data is kept next to the error
  pub async fn query<T, F, Fut>(&self, key: &QueryKey, fetch: F, options: QueryOptions) -> QueryResult<T>
  where
    T: Serialize + DeserializeOwned + Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    if !options.enabled {
      return QueryResult::idle();
    }
    let mode = if options.force {
      ClaimMode::Force
    } else {
      ClaimMode::Normal
    };
    self.execute(key, erase(fetch), options, mode).await
  }

  /// Mount a consumer on `key`.
  ///
  /// The observer is notified of every change to the entry, refetches when the
  /// entry is invalidated, and unsubscribes when dropped. A fetch it started
  /// keeps running after it is dropped and still populates the cache.
  pub fn subscribe<T, F, Fut>(&self, key: QueryKey, fetch: F, options: QueryOptions) -> QueryObserver<T>
  where
    T: Serialize + DeserializeOwned + Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let refetch = Refetch {
      fetcher: erase(fetch),
      options,
    };
    if !refetch.options.enabled {
      return QueryObserver::new(self.clone(), key, None, refetch);
    }

    let handle = self.store.subscribe_with(&key, Some(refetch.clone()));
    self.spawn_fetch(key.clone(), refetch.clone(), ClaimMode::Normal);
    QueryObserver::new(self.clone(), key, Some(handle), refetch)
  }

  /// Run a write and, once it succeeds, invalidate the descriptor's prefixes.
  ///
  /// Invalidation happens strictly after the write resolves and before this
  /// returns. A failed write invalidates nothing and produces an error notice.
  pub async fn mutate<R, F, Fut>(&self, descriptor: &MutationDescriptor, write: F) -> Result<R, ApiError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<R, ApiError>>,
  {
    let span = info_span!("mutation", name = descriptor.name);

    match write().instrument(span.clone()).await {
      Ok(value) => {
        span.in_scope(|| {
          for prefix in &descriptor.invalidates {
            self.invalidate(prefix);
          }
        });
        if let Some(message) = descriptor.success_message {
          self.notifier.notify(Notice::success(message));
        }
        Ok(value)
      }
      Err(error) => {
        warn!(operation = descriptor.name, error = %error, "mutation failed, cache left untouched");
        if error.is_auth() {
          self.teardown();
        }
        self.notifier.notify(Notice::failure(descriptor.name, &error));
        Err(error)
      }
    }
  }

  /// Mark entries under `prefix` stale and refetch the mounted ones.
  ///
  /// Returns the number of entries marked.
  pub fn invalidate(&self, prefix: &QueryKey) -> usize {
    let mark = self.store.mark_stale(prefix);
    info!(
      prefix = %prefix,
      matched = mark.matched.len(),
      refetching = mark.refetch.len(),
      "invalidated queries"
    );

    let matched = mark.matched.len();
    for (key, refetch) in mark.refetch {
      if !self.spawn_fetch(key.clone(), refetch, ClaimMode::Scheduled) {
        // No runtime to refetch on: fall back to refetch on next access
        self.store.cancel_scheduled(&key);
      }
    }
    matched
  }

  /// Cached data for `key`, if any, regardless of freshness.
  pub fn get_query_data<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
    let data = self.store.get(key)?.data?;
    T::deserialize(data.as_ref()).ok()
  }

  /// Seed or replace the data for `key` as if it had just been fetched.
  pub fn set_query_data<T: Serialize>(&self, key: &QueryKey, data: &T) -> Result<(), ApiError> {
    let value = serde_json::to_value(data).map_err(ApiError::decode)?;
    let now = Instant::now();
    let stale_time = self.defaults.stale_time;

    let idle = self.store.update(key, |entry| {
      entry.data = Some(Arc::new(value));
      entry.status = QueryStatus::Success;
      entry.error = None;
      entry.fetched_at = Some(chrono::Utc::now());
      entry.updated_at = Some(now);
      entry.stale_at = now.checked_add(stale_time);
      entry.invalidated = false;
    });
    if idle {
      schedule_gc(self.store.clone(), self.gc_time);
    }
    Ok(())
  }

  /// Drop every entry (session teardown).
  pub fn clear(&self) {
    self.teardown();
  }

  pub(crate) fn unsubscribe(&self, handle: &SubscriptionHandle) {
    if self.store.unsubscribe(handle) {
      schedule_gc(self.store.clone(), self.gc_time);
    }
  }

  pub(crate) async fn execute<T: DeserializeOwned>(
    &self,
    key: &QueryKey,
    fetcher: Fetcher,
    options: QueryOptions,
    mode: ClaimMode,
  ) -> QueryResult<T> {
    let claim = self.store.claim(key, mode, &options, Instant::now(), |id| {
      self.fetch_task(key.clone(), id, Arc::clone(&fetcher), options.clone())
    });

    let pending = match claim {
      Claim::Fresh(entry) => {
        debug!(key = %key, "serving cached entry");
        return QueryResult::from_entry(&entry, CacheSource::CacheFresh);
      }
      Claim::Evicted => {
        debug!(key = %key, "key evicted before its scheduled refetch");
        return QueryResult::from_entry(&CacheEntry::default(), CacheSource::Network);
      }
      Claim::Join(pending) => {
        debug!(key = %key, "joining in-flight fetch");
        pending
      }
      Claim::Started(pending) => {
        debug!(key = %key, "starting fetch");
        // Driven by its own task so it completes even if every caller goes away
        if let Ok(handle) = Handle::try_current() {
          handle.spawn(pending.clone());
        }
        pending
      }
    };

    self.settle(key, pending).await
  }

  /// Await a fetch, following newer requests for the same key if it was superseded.
  async fn settle<T: DeserializeOwned>(&self, key: &QueryKey, mut pending: SharedFetch) -> QueryResult<T> {
    loop {
      let outcome = pending.await;

      if matches!(outcome.result, Err(ApiError::Auth)) {
        self.teardown();
        return QueryResult::from_outcome(&outcome.result);
      }

      if !outcome.applied {
        if let Some(next) = self.store.in_flight(key) {
          pending = next;
          continue;
        }
      }

      return match self.store.get(key) {
        Some(entry) => QueryResult::from_entry(&entry, CacheSource::Network),
        None => QueryResult::from_outcome(&outcome.result),
      };
    }
  }

  /// Build (without running) the future for request `id` of `key`.
  fn fetch_task(
    &self,
    key: QueryKey,
    id: u64,
    fetcher: Fetcher,
    options: QueryOptions,
  ) -> SharedFetch {
    let store = self.store.clone();
    let gc_time = self.gc_time;
    let span = debug_span!("fetch", key = %key, hash = %key.short_hash(), request = id);

    async move {
      let retry = options.retry;
      let mut attempt = 0;

      let result = loop {
        match fetcher().await {
          Ok(value) => break Ok(Arc::new(value)),
          Err(error)
            if error.is_retryable() && attempt < retry.max_retries && store.is_current(&key, id) =>
          {
            let delay = retry.delay(attempt);
            attempt += 1;
            warn!(
              attempt,
              delay_ms = delay.as_millis() as u64,
              error = %error,
              "fetch failed, retrying"
            );
            tokio::time::sleep(delay).await;
          }
          Err(error) => {
            warn!(error = %error, "fetch failed");
            break Err(error);
          }
        }
      };

      let completion = store.complete(&key, id, &result, options.stale_time, Instant::now());
      if completion.idle {
        schedule_gc(store, gc_time);
      }

      FetchOutcome {
        result,
        applied: completion.applied,
      }
    }
    .instrument(span)
    .boxed()
    .shared()
  }

  /// Run a fetch for `key` in the background. Returns false without a runtime.
  fn spawn_fetch(&self, key: QueryKey, refetch: Refetch, mode: ClaimMode) -> bool {
    let Ok(handle) = Handle::try_current() else {
      return false;
    };
    let client = self.clone();
    handle.spawn(async move {
      let _: QueryResult<Value> = client
        .execute(&key, refetch.fetcher, refetch.options, mode)
        .await;
    });
    true
  }

  fn teardown(&self) {
    let cleared = self.store.clear();
    info!(cleared, "session ended, cache cleared");
  }
}

impl std::fmt::Debug for QueryClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryClient")
      .field("entries", &self.store.len())
      .field("defaults", &self.defaults)
      .field("gc_time", &self.gc_time)
      .finish_non_exhaustive()
  }
}

/// Erase a typed fetch function into one producing JSON.
fn erase<T, F, Fut>(fetch: F) -> Fetcher
where
  T: Serialize + Send + 'static,
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
{
  Arc::new(move || {
    let fut = fetch();
    async move {
      let data = fut.await?;
      serde_json::to_value(data).map_err(ApiError::decode)
    }
    .boxed()
  })
}

/// Evict idle entries once `gc_time` has passed.
fn schedule_gc(store: CacheStore, gc_time: Duration) {
  let Ok(handle) = Handle::try_current() else {
    return;
  };
  handle.spawn(async move {
    tokio::time::sleep(gc_time).await;
    let evicted = store.evict_idle(Instant::now(), gc_time);
    if !evicted.is_empty() {
      debug!(count = evicted.len(), "evicted idle cache entries");
    }
  });
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::mutation::NoticeLevel;
  use crate::cache::options::RetryPolicy;
  use crate::query_key;
  use futures::future::BoxFuture;
  use serde_json::json;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Mutex;

  fn client() -> QueryClient {
    QueryClient::new(QueryOptions::default().retry(RetryPolicy::none()))
  }

  /// Fetcher returning how many times it has been called.
  fn counting(
    calls: &Arc<AtomicU32>,
    delay: Duration,
  ) -> impl Fn() -> BoxFuture<'static, Result<u32, ApiError>> + Send + Sync + 'static {
    let calls = Arc::clone(calls);
    move || {
      let calls = Arc::clone(&calls);
      async move {
        tokio::time::sleep(delay).await;
        Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
      }
      .boxed()
    }
  }

  #[derive(Default)]
  struct RecordingNotifier(Mutex<Vec<Notice>>);

  impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
      self.0.lock().unwrap().push(notice);
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_concurrent_queries_share_one_fetch() {
    let client = client();
    let calls = Arc::new(AtomicU32::new(0));
    let key = query_key!["policies"];

    let (a, b) = tokio::join!(
      client.query(&key, counting(&calls, Duration::from_millis(50)), client.options()),
      client.query(&key, counting(&calls, Duration::from_millis(50)), client.options()),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.data, Some(1));
    assert_eq!(b.data, Some(1));
  }

  #[tokio::test(start_paused = true)]
  async fn test_fresh_entry_is_served_without_fetch() {
    let client = client();
    let calls = Arc::new(AtomicU32::new(0));
    let key = query_key!["carriers"];

    let first = client.query(&key, counting(&calls, Duration::ZERO), client.options()).await;
    assert_eq!(first.source, CacheSource::Network);

    tokio::time::advance(Duration::from_secs(29)).await;
    let second = client.query(&key, counting(&calls, Duration::ZERO), client.options()).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.data, Some(1));
    assert_eq!(second.status, QueryStatus::Success);
    assert_eq!(second.source, CacheSource::CacheFresh);
  }

  #[tokio::test(start_paused = true)]
  async fn test_stale_entry_is_refetched() {
    let client = client();
    let calls = Arc::new(AtomicU32::new(0));
    let key = query_key!["dashboard"];

    client.query(&key, counting(&calls, Duration::ZERO), client.options()).await;
    tokio::time::advance(Duration::from_secs(31)).await;
    let result = client.query(&key, counting(&calls, Duration::ZERO), client.options()).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(result.data, Some(2));
  }

  #[tokio::test]
  async fn test_disabled_query_never_touches_the_store() {
    let client = client();
    let calls = Arc::new(AtomicU32::new(0));
    let key = query_key!["quickSearchAccounts", "a"];

    let result = client
      .query(&key, counting(&calls, Duration::ZERO), client.options().enabled(false))
      .await;

    assert_eq!(result.status, QueryStatus::Idle);
    assert_eq!(result.source, CacheSource::Disabled);
    assert!(result.data.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(client.store().is_empty());
  }

  #[tokio::test]
  async fn test_failed_refresh_keeps_previous_data() {
    let client = client();
    let calls = Arc::new(AtomicU32::new(0));
    let key = query_key!["policy", "P1"];

    client.query(&key, counting(&calls, Duration::ZERO), client.options()).await;
    let result = client
      .query(
        &key,
        || async {
          Err::<u32, _>(ApiError::Server {
            status: 502,
            detail: "bad gateway".into(),
          })
        },
        client.options().force(),
      )
      .await;

    assert_eq!(result.status, QueryStatus::Error);
    assert_eq!(result.data, Some(1));
    assert_eq!(result.source, CacheSource::CacheStale);
    assert!(matches!(result.error, Some(ApiError::Server { status: 502, .. })));
  }

  #[tokio::test(start_paused = true)]
  async fn test_retryable_errors_are_retried_with_backoff() {
    let client = QueryClient::new(
      QueryOptions::default().retry(RetryPolicy::retries(2).with_backoff(Duration::from_secs(1))),
    );
    let calls = Arc::new(AtomicU32::new(0));
    let key = query_key!["salesSummary"];
    let started = Instant::now();

    let fetch_calls = Arc::clone(&calls);
    let result = client
      .query(
        &key,
        move || {
          let calls = Arc::clone(&fetch_calls);
          async move {
            match calls.fetch_add(1, Ordering::SeqCst) {
              0 | 1 => Err(ApiError::Network("connection reset".into())),
              n => Ok(n),
            }
          }
        },
        client.options(),
      )
      .await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(result.data, Some(2));
    // 1s before the first retry, 2s before the second
    assert!(started.elapsed() >= Duration::from_secs(3));
  }

  #[tokio::test]
  async fn test_validation_errors_are_not_retried() {
    let client = QueryClient::new(QueryOptions::default().retry(RetryPolicy::retries(3)));
    let calls = Arc::new(AtomicU32::new(0));
    let key = query_key!["account", "missing"];

    let fetch_calls = Arc::clone(&calls);
    let result = client
      .query(
        &key,
        move || {
          fetch_calls.fetch_add(1, Ordering::SeqCst);
          async {
            Err::<u32, _>(ApiError::Validation {
              status: 404,
              detail: "Account not found".into(),
              fields: Vec::new(),
            })
          }
        },
        client.options(),
      )
      .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(result.is_error());
  }

  #[tokio::test(start_paused = true)]
  async fn test_simultaneous_mounts_share_one_fetch() {
    let client = client();
    let calls = Arc::new(AtomicU32::new(0));
    let key = query_key!["policies"];

    let mut first = client.subscribe(key.clone(), counting(&calls, Duration::from_millis(20)), client.options());
    let mut second = client.subscribe(key.clone(), counting(&calls, Duration::from_millis(20)), client.options());

    let a = first.wait_for(|r| r.is_success()).await.unwrap();
    let b = second.wait_for(|r| r.is_success()).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.data, b.data);
    assert_eq!(client.store().get(&key).unwrap().subscriber_count, 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_invalidation_refetches_mounted_subscriber_once() {
    let client = client();
    let calls = Arc::new(AtomicU32::new(0));
    let key = query_key!["accountPolicies", "A1"];

    let mut observer = client.subscribe(key, counting(&calls, Duration::from_millis(10)), client.options());
    let first = observer.wait_for(|r| r.is_success()).await.unwrap();
    assert_eq!(first.data, Some(1));

    // Second mark lands before the scheduled refetch starts
    assert_eq!(client.invalidate(&query_key!["accountPolicies"]), 1);
    assert_eq!(client.invalidate(&query_key!["accountPolicies", "A1"]), 1);

    let refreshed = observer
      .wait_for(|r| r.is_success() && r.data == Some(2))
      .await
      .unwrap();
    assert_eq!(refreshed.source, CacheSource::CacheFresh);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_invalidation_during_fetch_supersedes_it() {
    let client = client();
    let calls = Arc::new(AtomicU32::new(0));
    let key = query_key!["serviceBoard"];

    let mut observer = client.subscribe(key.clone(), counting(&calls, Duration::from_millis(100)), client.options());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(client.store().is_fetching(&key));

    client.invalidate(&query_key!["serviceBoard"]);

    let settled = observer.wait_for(|r| r.is_success()).await.unwrap();
    // The pre-invalidation response was discarded in favor of the refetch
    assert_eq!(settled.data, Some(2));
    assert!(!client.store().get(&key).unwrap().invalidated);
  }

  #[tokio::test(start_paused = true)]
  async fn test_mutation_invalidates_after_write_resolves() {
    let client = client();
    let calls = Arc::new(AtomicU32::new(0));
    let key = query_key!["policies", json!({"page": 1})];

    client.query(&key, counting(&calls, Duration::ZERO), client.options()).await;

    let descriptor = MutationDescriptor::new("create_policy").invalidates(query_key!["policies"]);
    let store = client.store().clone();
    let watched = key.clone();
    let created = client
      .mutate(&descriptor, || async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!store.get(&watched).unwrap().invalidated, "invalidated before the write resolved");
        Ok::<_, ApiError>("P1")
      })
      .await;

    assert_eq!(created, Ok("P1"));
    assert!(client.store().get(&key).unwrap().invalidated);

    let reread = client.query(&key, counting(&calls, Duration::ZERO), client.options()).await;
    assert_eq!(reread.data, Some(2));
  }

  #[tokio::test]
  async fn test_failed_mutation_leaves_cache_untouched() {
    let notifier = Arc::new(RecordingNotifier::default());
    let client = client().with_notifier(notifier.clone());
    let calls = Arc::new(AtomicU32::new(0));
    let key = query_key!["policies"];

    client.query(&key, counting(&calls, Duration::ZERO), client.options()).await;

    let descriptor = MutationDescriptor::new("create_policy").invalidates(query_key!["policies"]);
    let result = client
      .mutate(&descriptor, || async {
        Err::<(), _>(ApiError::Validation {
          status: 422,
          detail: "body.effective_date: field required".into(),
          fields: Vec::new(),
        })
      })
      .await;

    assert!(result.is_err());
    assert!(!client.store().get(&key).unwrap().invalidated);
    client.query(&key, counting(&calls, Duration::ZERO), client.options()).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let notices = notifier.0.lock().unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert_eq!(notices[0].message, "body.effective_date: field required");
  }

  #[tokio::test(start_paused = true)]
  async fn test_late_response_from_superseded_request_is_discarded() {
    let client = client();
    let key = query_key!["accounts", json!({"search": "a"})];

    let slow = client.query(
      &key,
      || async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok::<_, ApiError>("old".to_string())
      },
      client.options(),
    );
    let fresh = async {
      tokio::time::sleep(Duration::from_millis(10)).await;
      client.invalidate(&key);
      client
        .query(
          &key,
          || async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<_, ApiError>("new".to_string())
          },
          client.options(),
        )
        .await
    };

    let (slow_result, fresh_result) = tokio::join!(slow, fresh);
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(fresh_result.data.as_deref(), Some("new"));
    assert_eq!(slow_result.data.as_deref(), Some("new"));
    assert_eq!(client.get_query_data::<String>(&key).as_deref(), Some("new"));
  }

  #[tokio::test(start_paused = true)]
  async fn test_response_only_populates_its_own_key() {
    let client = client();
    let a = query_key!["accounts", json!({"search": "a"})];
    let ab = query_key!["accounts", json!({"search": "ab"})];

    let typed_a = client.query(
      &a,
      || async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok::<_, ApiError>(vec!["Acme".to_string(), "Abbott".to_string()])
      },
      client.options(),
    );
    let typed_ab = async {
      tokio::time::sleep(Duration::from_millis(5)).await;
      client
        .query(
          &ab,
          || async { Ok::<_, ApiError>(vec!["Abbott".to_string()]) },
          client.options(),
        )
        .await
    };
    tokio::join!(typed_a, typed_ab);

    assert_eq!(client.get_query_data::<Vec<String>>(&ab), Some(vec!["Abbott".to_string()]));
    assert_eq!(client.get_query_data::<Vec<String>>(&a).map(|v| v.len()), Some(2));
  }

  #[tokio::test(start_paused = true)]
  async fn test_fetch_completes_after_last_subscriber_unmounts() {
    let client = client();
    let calls = Arc::new(AtomicU32::new(0));
    let key = query_key!["prospect", "X1"];

    let observer = client.subscribe::<u32, _, _>(key.clone(), counting(&calls, Duration::from_millis(50)), client.options());
    tokio::task::yield_now().await;
    drop(observer);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let entry = client.store().get(&key).unwrap();
    assert_eq!(entry.data.as_deref(), Some(&Value::from(1)));
    assert_eq!(entry.subscriber_count, 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_idle_entries_are_evicted_after_gc_time() {
    let client = client().with_gc_time(Duration::from_secs(60));
    let calls = Arc::new(AtomicU32::new(0));
    let idle = query_key!["carriers"];
    let mounted = query_key!["dashboard"];

    client.query(&idle, counting(&calls, Duration::ZERO), client.options()).await;
    let mut observer = client.subscribe(mounted.clone(), counting(&calls, Duration::ZERO), client.options());
    observer.wait_for(|r| r.is_success()).await.unwrap();

    tokio::time::sleep(Duration::from_secs(59)).await;
    assert!(client.store().get(&idle).is_some());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(client.store().get(&idle).is_none());
    assert!(client.store().get(&mounted).is_some());
  }

  #[tokio::test]
  async fn test_auth_error_clears_the_cache() {
    let client = client();
    let calls = Arc::new(AtomicU32::new(0));

    client.query(&query_key!["carriers"], counting(&calls, Duration::ZERO), client.options()).await;
    let result = client
      .query(
        &query_key!["dashboard"],
        || async { Err::<u32, _>(ApiError::Auth) },
        client.options(),
      )
      .await;

    assert_eq!(result.error, Some(ApiError::Auth));
    assert!(client.store().is_empty());
  }

  /// Fetcher resolving to `value` after `delay`.
  fn delayed(
    value: &'static str,
    delay: Duration,
  ) -> impl Fn() -> BoxFuture<'static, Result<String, ApiError>> + Send + Sync + 'static {
    move || {
      async move {
        tokio::time::sleep(delay).await;
        Ok(value.to_string())
      }
      .boxed()
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_response_from_before_clear_does_not_overwrite_new_session() {
    let client = client();
    let key = query_key!["dashboard"];

    let old_session = client.query(&key, delayed("old-session", Duration::from_millis(100)), client.options());
    let new_session = async {
      tokio::time::sleep(Duration::from_millis(10)).await;
      client.clear();
      client
        .query(&key, delayed("new-session", Duration::from_millis(10)), client.options())
        .await
    };

    let (_, fresh) = tokio::join!(old_session, new_session);
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(fresh.data.as_deref(), Some("new-session"));
    assert_eq!(client.get_query_data::<String>(&key).as_deref(), Some("new-session"));
  }

  #[tokio::test(start_paused = true)]
  async fn test_response_from_before_clear_keeps_newer_fetch_in_flight() {
    let client = client();
    let key = query_key!["accountPolicies", "A1"];

    let old_session = client.query(&key, delayed("old-session", Duration::from_millis(100)), client.options());
    let new_session = async {
      tokio::time::sleep(Duration::from_millis(10)).await;
      client.clear();
      let fetch = client.query(&key, delayed("new-session", Duration::from_millis(200)), client.options());
      let check = async {
        // Old response has landed, the newer request has not
        tokio::time::sleep(Duration::from_millis(140)).await;
        assert!(client.store().is_fetching(&key));
        assert!(client.get_query_data::<String>(&key).is_none());
      };
      tokio::join!(fetch, check).0
    };

    let (_, fresh) = tokio::join!(old_session, new_session);
    assert_eq!(fresh.data.as_deref(), Some("new-session"));
    assert!(!client.store().is_fetching(&key));
  }

  #[tokio::test(start_paused = true)]
  async fn test_scheduled_refetch_after_clear_leaves_store_empty() {
    let client = client();
    let calls = Arc::new(AtomicU32::new(0));
    let key = query_key!["serviceBoard"];

    let mut observer = client.subscribe(key.clone(), counting(&calls, Duration::ZERO), client.options());
    observer.wait_for(|r| r.is_success()).await.unwrap();

    client.invalidate(&query_key!["serviceBoard"]);
    client.clear();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(client.store().is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_seeded_entry_is_evicted_after_gc_time() {
    let client = client().with_gc_time(Duration::from_secs(60));
    let key = query_key!["account", "A1"];

    client.set_query_data(&key, &"Acme".to_string()).unwrap();

    tokio::time::sleep(Duration::from_secs(59)).await;
    assert!(client.store().get(&key).is_some());
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(client.store().get(&key).is_none());
  }

  #[tokio::test]
  async fn test_set_query_data_is_served_fresh() {
    let client = client();
    let calls = Arc::new(AtomicU32::new(0));
    let key = query_key!["account", "A1"];

    client.set_query_data(&key, &41u32).unwrap();
    let result = client.query(&key, counting(&calls, Duration::ZERO), client.options()).await;

    assert_eq!(result.data, Some(41));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }
}
