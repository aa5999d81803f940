//! A mounted consumer of one query.
//!
//! # Example
//!
//! ```ignore
//! let mut observer = queries.subscribe(
//!     query_key!["dashboard"],
//!     move || {
//!         let api = api.clone();
//!         async move { api.dashboard().await }
//!     },
//!     queries.options(),
//! );
//!
//! // In event loop tick
//! if observer.poll() {
//!     // Entry changed, re-render
//! }
//!
//! // In render
//! let result = observer.current();
//! ```

use serde::de::DeserializeOwned;
use std::marker::PhantomData;

use super::client::QueryClient;
use super::key::QueryKey;
use super::store::{ClaimMode, Refetch, SubscriptionHandle};
use super::traits::{CacheSource, QueryResult};

/// Subscription to a query entry. Unsubscribes on drop.
///
/// A disabled observer holds no subscription and always reads as idle.
pub struct QueryObserver<T> {
  client: QueryClient,
  key: QueryKey,
  handle: Option<SubscriptionHandle>,
  refetch: Refetch,
  _data: PhantomData<fn() -> T>,
}

impl<T> QueryObserver<T> {
  pub(crate) fn new(
    client: QueryClient,
    key: QueryKey,
    handle: Option<SubscriptionHandle>,
    refetch: Refetch,
  ) -> Self {
    Self {
      client,
      key,
      handle,
      refetch,
      _data: PhantomData,
    }
  }

  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  pub fn is_enabled(&self) -> bool {
    self.handle.is_some()
  }

  /// Check whether the entry changed since the last look. Non-blocking.
  pub fn poll(&mut self) -> bool {
    let Some(handle) = self.handle.as_mut() else {
      return false;
    };
    match handle.receiver().has_changed() {
      Ok(true) => {
        handle.receiver_mut().borrow_and_update();
        true
      }
      _ => false,
    }
  }
}

impl<T: DeserializeOwned> QueryObserver<T> {
  /// The entry as it is right now.
  pub fn current(&self) -> QueryResult<T> {
    match &self.handle {
      Some(handle) => QueryResult::from_entry(&handle.receiver().borrow(), CacheSource::CacheFresh),
      None => QueryResult::idle(),
    }
  }

  /// Wait for the next change to the entry.
  ///
  /// Returns `None` for a disabled observer or when the entry was removed
  /// from the store.
  pub async fn changed(&mut self) -> Option<QueryResult<T>> {
    let handle = self.handle.as_mut()?;
    handle.receiver_mut().changed().await.ok()?;
    handle.receiver_mut().borrow_and_update();
    Some(self.current())
  }

  /// Wait until the entry satisfies `predicate`.
  pub async fn wait_for(
    &mut self,
    mut predicate: impl FnMut(&QueryResult<T>) -> bool,
  ) -> Option<QueryResult<T>> {
    loop {
      if let Some(handle) = self.handle.as_mut() {
        handle.receiver_mut().borrow_and_update();
      }
      let current = self.current();
      if predicate(&current) {
        return Some(current);
      }
      self.changed().await?;
    }
  }

  /// Fetch now, ignoring freshness.
  pub async fn refetch(&self) -> QueryResult<T> {
    if self.handle.is_none() {
      return QueryResult::idle();
    }
    self
      .client
      .execute(
        &self.key,
        self.refetch.fetcher.clone(),
        self.refetch.options.clone(),
        ClaimMode::Force,
      )
      .await
  }
}

impl<T> Drop for QueryObserver<T> {
  fn drop(&mut self) {
    if let Some(handle) = &self.handle {
      self.client.unsubscribe(handle);
    }
  }
}

impl<T> std::fmt::Debug for QueryObserver<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryObserver")
      .field("key", &self.key)
      .field("enabled", &self.is_enabled())
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use crate::cache::{QueryClient, QueryOptions, QueryStatus, RetryPolicy};
  use crate::error::ApiError;
  use crate::query_key;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;

  #[tokio::test]
  async fn test_disabled_observer_stays_idle() {
    let client = QueryClient::new(QueryOptions::default());
    let mut observer = client.subscribe(
      query_key!["quickSearchProspects", "x"],
      || async { Ok::<_, ApiError>(1u32) },
      client.options().enabled(false),
    );

    assert!(!observer.is_enabled());
    assert_eq!(observer.current().status, QueryStatus::Idle);
    assert!(observer.changed().await.is_none());
    assert!(client.store().is_empty());
  }

  #[tokio::test]
  async fn test_refetch_ignores_freshness() {
    let client = QueryClient::new(QueryOptions::default().retry(RetryPolicy::none()));
    let calls = Arc::new(AtomicU32::new(0));
    let fetch_calls = Arc::clone(&calls);
    let mut observer = client.subscribe(
      query_key!["carriers"],
      move || {
        let n = fetch_calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move { Ok::<_, ApiError>(n) }
      },
      client.options(),
    );

    observer.wait_for(|r| r.is_success()).await.unwrap();
    let result = observer.refetch().await;

    assert_eq!(result.data, Some(2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_drop_unsubscribes() {
    let client = QueryClient::new(QueryOptions::default());
    let key = query_key!["dashboard"];
    let observer = client.subscribe(key.clone(), || async { Ok::<_, ApiError>(0u32) }, client.options());
    assert_eq!(client.store().get(&key).unwrap().subscriber_count, 1);

    drop(observer);
    assert_eq!(client.store().get(&key).unwrap().subscriber_count, 0);
  }
}
