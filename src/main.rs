mod app;
mod cache;
mod cli;
mod config;
mod offline;
mod perf;
mod portfolio;

use clap::Parser;
use color_eyre::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log to a daily file under the data directory, plus stderr with --verbose.
/// RUST_LOG overrides the default `warn` level.
fn init_tracing(verbose: bool) -> Result<WorkerGuard> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
    EnvFilter::new(if verbose { "folio=debug,warn" } else { "warn" })
  });

  let log_dir = config::Config::log_dir()?;
  let file_appender = tracing_appender::rolling::daily(&log_dir, "folio.log");
  let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

  let stderr = verbose.then(|| fmt::layer().with_target(true).with_writer(std::io::stderr));

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
    .with(stderr)
    .init();

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = cli::Args::parse();
  let _guard = init_tracing(args.verbose)?;

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  info!(url = %config.supabase.url, "folio starting");

  let app = app::App::new(config)?;
  app.run(args.command).await
}
