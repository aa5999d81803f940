use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{QueryOptions, RetryPolicy};

/// Overrides `api.url` when set.
pub const API_URL_ENV: &str = "SENTINEL_API_URL";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Server root; requests go to `<url>/api/...`
  #[serde(default = "default_api_url")]
  pub url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: default_api_url(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

fn default_api_url() -> String {
  "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Freshness window for cached reads
  pub stale_time_ms: u64,
  /// Idle time before an entry without subscribers is evicted
  pub gc_time_ms: u64,
  /// Retries after a failed fetch (network and 5xx errors only)
  pub retry: u32,
  pub retry_backoff_ms: u64,
  pub max_retry_backoff_ms: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_time_ms: 30_000,
      gc_time_ms: 300_000,
      retry: 1,
      retry_backoff_ms: 1_000,
      max_retry_backoff_ms: 30_000,
    }
  }
}

impl CacheConfig {
  pub fn query_options(&self) -> QueryOptions {
    QueryOptions::default()
      .stale_time(Duration::from_millis(self.stale_time_ms))
      .retry(RetryPolicy {
        max_retries: self.retry,
        backoff: Duration::from_millis(self.retry_backoff_ms),
        max_backoff: Duration::from_millis(self.max_retry_backoff_ms),
      })
  }

  pub fn gc_time(&self) -> Duration {
    Duration::from_millis(self.gc_time_ms)
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
  /// Filter directive used when RUST_LOG is not set (e.g. "info", "sentinel=debug")
  pub level: Option<String>,
  /// Write logs to this file instead of stderr
  pub file: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./sentinel.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/sentinel/config.yaml
  ///
  /// Without a file the defaults are used. `SENTINEL_API_URL` overrides the
  /// configured server.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    if let Ok(url) = std::env::var(API_URL_ENV) {
      if !url.trim().is_empty() {
        config.api.url = url.trim().to_string();
      }
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("sentinel.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("sentinel").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }
}
