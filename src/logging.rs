//! Tracing subscriber setup.
//!
//! The filter comes from `SPRINTD_LOG`, then `RUST_LOG`, then `info`.
//! Output goes to stderr, since stdout carries command results, or to the
//! configured log file through a non-blocking writer.

use std::io;
use std::path::Path;

use color_eyre::{eyre::eyre, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
  EnvFilter::try_from_env("SPRINTD_LOG")
    .or_else(|_| EnvFilter::try_from_default_env())
    .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber.
///
/// With a log file the returned guard must be held until exit; dropping it
/// flushes pending lines.
pub fn init(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
  let subscriber = tracing_subscriber::registry().with(env_filter());

  match log_file {
    None => {
      subscriber
        .with(fmt::layer().with_writer(io::stderr))
        .try_init()
        .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;
      Ok(None)
    }
    Some(path) => {
      let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
      };
      let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("Log file path has no file name: {}", path.display()))?;
      std::fs::create_dir_all(dir)
        .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

      let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
      subscriber
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .try_init()
        .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;
      Ok(Some(guard))
    }
  }
}
