//! Tracing subscriber setup.

use color_eyre::{eyre::eyre, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

/// Used when neither `RUST_LOG` nor `log.level` is set.
const DEFAULT_FILTER: &str = "sentinel=warn";

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `log.level`. With `log.file` set, events go to that
/// file through a non-blocking writer and the returned guard must be held
/// until exit so buffered lines get flushed. Otherwise events go to stderr.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env()
    .or_else(|_| EnvFilter::try_new(config.level.as_deref().unwrap_or(DEFAULT_FILTER)))
    .map_err(|e| eyre!("Invalid log filter: {}", e))?;

  match &config.file {
    Some(path) => {
      let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));
      let name = path
        .file_name()
        .ok_or_else(|| eyre!("Log file path has no file name: {}", path.display()))?;
      std::fs::create_dir_all(dir)
        .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

      let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
      tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()
        .map_err(|e| eyre!("Failed to install logger: {}", e))?;
      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| eyre!("Failed to install logger: {}", e))?;
      Ok(None)
    }
  }
}
