//! Agency domain on top of the cache: query keys, invalidation rules and the
//! client that ties them to the API.

mod client;
pub mod keys;
pub mod rules;

pub use client::{AgencyClient, QuickSearch, QUICK_SEARCH_LIMIT, QUICK_SEARCH_MIN_CHARS};
pub use rules::{invalidations, Operation};
