//! Per-query options and the retry policy.

use std::time::Duration;

/// Retry behavior for failed fetches.
///
/// Only retryable errors (network failures and 5xx) are retried. The delay
/// before retry `n` (0-based) is `backoff * 2^n`, capped at `max_backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  pub max_retries: u32,
  pub backoff: Duration,
  pub max_backoff: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_retries: 1,
      backoff: Duration::from_secs(1),
      max_backoff: Duration::from_secs(30),
    }
  }
}

impl RetryPolicy {
  pub fn none() -> Self {
    Self {
      max_retries: 0,
      ..Self::default()
    }
  }

  pub fn retries(max_retries: u32) -> Self {
    Self {
      max_retries,
      ..Self::default()
    }
  }

  pub fn with_backoff(mut self, backoff: Duration) -> Self {
    self.backoff = backoff;
    self
  }

  /// Delay before retry number `attempt`.
  pub fn delay(&self, attempt: u32) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    self
      .backoff
      .checked_mul(factor)
      .unwrap_or(self.max_backoff)
      .min(self.max_backoff)
  }
}

/// Options for a single `query` call or subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
  /// How long fetched data is served without refetching
  pub stale_time: Duration,
  pub retry: RetryPolicy,
  /// When false nothing is looked up or fetched and the result is idle
  pub enabled: bool,
  /// Refetch even if the cached data is fresh
  pub force: bool,
}

impl Default for QueryOptions {
  fn default() -> Self {
    Self {
      stale_time: Duration::from_secs(30),
      retry: RetryPolicy::default(),
      enabled: true,
      force: false,
    }
  }
}

impl QueryOptions {
  pub fn stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  pub fn retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  pub fn enabled(mut self, enabled: bool) -> Self {
    self.enabled = enabled;
    self
  }

  pub fn force(mut self) -> Self {
    self.force = true;
    self
  }
}
