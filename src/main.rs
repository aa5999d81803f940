use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use sentinel::agency::AgencyClient;
use sentinel::commands::{self, Command, ConsoleNotifier};
use sentinel::config::Config;
use sentinel::logging;
use sentinel::session::Session;

#[derive(Parser, Debug)]
#[command(name = "sentinel")]
#[command(about = "Command line client for the Sentinel agency management system")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/sentinel/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Server URL, overriding the config file
  #[arg(long, global = true)]
  api_url: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
  color_eyre::install()?;

  let args = Args::parse();

  let mut config = Config::load(args.config.as_deref())?;
  if let Some(url) = args.api_url {
    config.api.url = url;
  }

  // Held until exit so the file writer flushes
  let _log_guard = logging::init(&config.log)?;

  let session = Session::load()?;
  let client = AgencyClient::new(&config, session)?.with_notifier(Arc::new(ConsoleNotifier));

  commands::run(args.command, &client).await
}
