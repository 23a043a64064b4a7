//! Logging setup: console output plus an optional append-only log file.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::{ArchiveError, Result};

/// Levels accepted in `logging.level`.
const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Normalize a configured level name. Unknown names fall back to `info`.
fn normalize_level(level: &str) -> &'static str {
    let level = level.trim().to_ascii_lowercase();
    let level = if level == "warning" { "warn" } else { level.as_str() };
    LEVELS.iter().copied().find(|l| *l == level).unwrap_or("info")
}

/// `RUST_LOG` takes precedence over the configured level.
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(normalize_level(level)))
}

/// Install the global subscriber.
///
/// Logs always go to stdout. When `config.file` is set they are also appended
/// to that file (its directory is created if missing), so restarts keep the
/// history of uploads and sweeps.
pub fn init(config: &LoggingConfig) -> Result<()> {
    if config.file.is_empty() {
        return try_init_console(&config.level);
    }

    let path = Path::new(&config.file);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let log_file = Arc::new(OpenOptions::new().create(true).append(true).open(path)?);

    tracing_subscriber::registry()
        .with(build_filter(&config.level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout.and(log_file))
                .with_ansi(false)
                .with_target(true),
        )
        .try_init()
        .map_err(|e| ArchiveError::Config(format!("logging already initialized: {e}")))
}

/// Console-only logging, used as the fallback when [`init`] fails.
pub fn init_console_only(level: &str) {
    if let Err(e) = try_init_console(level) {
        eprintln!("{e}");
    }
}

fn try_init_console(level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(build_filter(level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_target(true),
        )
        .try_init()
        .map_err(|e| ArchiveError::Config(format!("logging already initialized: {e}")))
}
