//! Client for the Sentinel agency management API.
//!
//! Reads are served through a query cache ([`cache`]) keyed by structural
//! query keys; writes invalidate the affected keys once the server accepts
//! them ([`agency::rules`]).

pub mod agency;
pub mod api;
pub mod cache;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod session;
