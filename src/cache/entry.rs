use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::traits::QueryStatus;
use crate::error::ApiError;

/// A cached query result as held by the store.
///
/// Data is kept as JSON so one store can hold every resource type; consumers
/// decode it into their own types on read.
#[derive(Debug, Clone)]
pub struct CacheEntry {
  /// Last successfully fetched payload
  pub data: Option<Arc<Value>>,
  pub status: QueryStatus,
  /// Error from the most recent failed fetch, cleared on success
  pub error: Option<ApiError>,
  /// Wall-clock time of the last successful fetch
  pub fetched_at: Option<DateTime<Utc>>,
  /// Monotonic time of the last successful fetch
  pub updated_at: Option<Instant>,
  /// When the last fetch stops being fresh under the window it was fetched with
  pub stale_at: Option<Instant>,
  /// Set by invalidation, cleared by a fetch that started after it
  pub invalidated: bool,
  pub subscriber_count: usize,
}

impl Default for CacheEntry {
  fn default() -> Self {
    Self {
      data: None,
      status: QueryStatus::Idle,
      error: None,
      fetched_at: None,
      updated_at: None,
      stale_at: None,
      invalidated: false,
      subscriber_count: 0,
    }
  }
}

impl CacheEntry {
  /// Whether the data can be served without a fetch under `stale_time`.
  pub fn is_fresh(&self, stale_time: Duration, now: Instant) -> bool {
    if self.data.is_none() || self.invalidated {
      return false;
    }
    match self.updated_at {
      // An overflowing deadline means "fresh forever"
      Some(updated) => updated.checked_add(stale_time).map_or(true, |deadline| now < deadline),
      None => false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn fetched(now: Instant) -> CacheEntry {
    CacheEntry {
      data: Some(Arc::new(Value::from(1))),
      status: QueryStatus::Success,
      updated_at: Some(now),
      ..CacheEntry::default()
    }
  }

  #[test]
  fn test_empty_entry_is_stale() {
    let now = Instant::now();
    assert!(!CacheEntry::default().is_fresh(Duration::from_secs(30), now));
  }

  #[test]
  fn test_freshness_window() {
    let now = Instant::now();
    let entry = fetched(now);
    assert!(entry.is_fresh(Duration::from_secs(30), now + Duration::from_secs(29)));
    assert!(!entry.is_fresh(Duration::from_secs(30), now + Duration::from_secs(30)));
    assert!(!entry.is_fresh(Duration::ZERO, now));
  }

  #[test]
  fn test_invalidated_entry_is_stale() {
    let now = Instant::now();
    let entry = CacheEntry {
      invalidated: true,
      ..fetched(now)
    };
    assert!(!entry.is_fresh(Duration::from_secs(3600), now));
  }
}
