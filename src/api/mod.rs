mod client;
mod endpoints;
pub mod types;

pub use client::ApiClient;
