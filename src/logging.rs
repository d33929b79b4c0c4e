//! File-only tracing setup. The TUI owns stdout, so nothing is written to the terminal.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::constants::constants;

fn log_dir() -> PathBuf {
  directories::ProjectDirs::from("", "", &constants().app_name)
    .map(|dirs| dirs.data_dir().join("logs"))
    .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Install the global subscriber. Keep the guard alive until exit so buffered
/// lines are flushed. Returns `None` when the log directory can't be created.
pub fn init() -> Option<WorkerGuard> {
  let dir = log_dir();
  if let Err(e) = std::fs::create_dir_all(&dir) {
    eprintln!("Failed to create log directory {}: {}", dir.display(), e);
    return None;
  }

  let name = &constants().app_name;
  let appender = tracing_appender::rolling::daily(&dir, format!("{}.log", name));
  let (writer, guard) = tracing_appender::non_blocking(appender);
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("{}=info", name)));

  let layer = fmt::layer().with_writer(writer).with_ansi(false).with_target(true).with_line_number(true);
  if tracing_subscriber::registry().with(filter).with(layer).try_init().is_err() {
    return None;
  }
  Some(guard)
}
