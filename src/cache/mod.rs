//! Client-side read cache with mutation-driven invalidation.
//!
//! This module provides a backend-agnostic query cache that:
//! - Keys responses by structured [`QueryKey`]s and serves them while fresh
//! - Shares one in-flight fetch between concurrent readers of a key
//! - Keeps previous data visible while a refetch runs or after it fails
//! - Marks entries stale by key prefix once a write is acknowledged, and
//!   refetches the ones that are currently mounted
//! - Evicts entries nobody has looked at for a while

mod client;
mod entry;
mod key;
mod mutation;
mod observer;
mod options;
mod store;
mod traits;

pub use client::{QueryClient, DEFAULT_GC_TIME};
pub use entry::CacheEntry;
pub use key::QueryKey;
pub use mutation::{MutationDescriptor, Notice, NoticeLevel, Notifier, TracingNotifier};
pub use observer::QueryObserver;
pub use options::{QueryOptions, RetryPolicy};
pub use store::{CacheStore, StaleMark, SubscriptionHandle};
pub use traits::{CacheSource, QueryResult, QueryStatus};
