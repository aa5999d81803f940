//! Core types returned by the query engine.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use super::entry::CacheEntry;
use crate::error::ApiError;

/// Fetch status of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
  /// Never fetched (or the query is disabled)
  Idle,
  /// A fetch is in flight; previous data, if any, is still available
  Loading,
  /// Last fetch succeeded
  Success,
  /// Last fetch failed; previous data, if any, is retained
  Error,
}

/// Indicates where returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, still considered fresh
  CacheFresh,
  /// Data from cache that is stale or whose refresh failed
  CacheStale,
  /// Query was disabled, nothing was looked up
  Disabled,
}

/// Snapshot of a query as seen by a consumer.
#[derive(Debug, Clone)]
pub struct QueryResult<T> {
  pub data: Option<T>,
  pub status: QueryStatus,
  pub error: Option<ApiError>,
  /// When `data` was fetched
  pub fetched_at: Option<DateTime<Utc>>,
  pub source: CacheSource,
}

impl<T> QueryResult<T> {
  /// Result for a disabled query.
  pub fn idle() -> Self {
    Self {
      data: None,
      status: QueryStatus::Idle,
      error: None,
      fetched_at: None,
      source: CacheSource::Disabled,
    }
  }

  pub fn is_loading(&self) -> bool {
    self.status == QueryStatus::Loading
  }

  pub fn is_success(&self) -> bool {
    self.status == QueryStatus::Success
  }

  pub fn is_error(&self) -> bool {
    self.status == QueryStatus::Error
  }

  pub fn data(&self) -> Option<&T> {
    self.data.as_ref()
  }

  /// Take the data, or the error when there is nothing to show.
  pub fn into_result(self) -> Result<T, ApiError> {
    match (self.data, self.error) {
      (Some(data), _) => Ok(data),
      (None, Some(err)) => Err(err),
      (None, None) => Err(ApiError::Cancelled),
    }
  }
}

impl<T: DeserializeOwned> QueryResult<T> {
  /// Decode a stored entry for a consumer.
  pub(crate) fn from_entry(entry: &CacheEntry, source: CacheSource) -> Self {
    let data = match entry.data.as_deref().map(|value| T::deserialize(value)) {
      Some(Ok(data)) => Some(data),
      Some(Err(e)) => {
        return Self {
          data: None,
          status: QueryStatus::Error,
          error: Some(ApiError::decode(e)),
          fetched_at: entry.fetched_at,
          source,
        }
      }
      None => None,
    };

    let source = if data.is_some() && (entry.invalidated || entry.status == QueryStatus::Error) {
      CacheSource::CacheStale
    } else {
      source
    };

    Self {
      data,
      status: entry.status,
      error: entry.error.clone(),
      fetched_at: entry.fetched_at,
      source,
    }
  }

  /// Result for a fetch whose entry is no longer in the store.
  pub(crate) fn from_outcome(result: &Result<std::sync::Arc<serde_json::Value>, ApiError>) -> Self {
    match result {
      Ok(value) => match T::deserialize(value.as_ref()) {
        Ok(data) => Self {
          data: Some(data),
          status: QueryStatus::Success,
          error: None,
          fetched_at: Some(Utc::now()),
          source: CacheSource::Network,
        },
        Err(e) => Self::failed(ApiError::decode(e)),
      },
      Err(e) => Self::failed(e.clone()),
    }
  }

  fn failed(error: ApiError) -> Self {
    Self {
      data: None,
      status: QueryStatus::Error,
      error: Some(error),
      fetched_at: None,
      source: CacheSource::Network,
    }
  }
}
