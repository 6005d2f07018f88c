//! Tracing setup for the CLI: stdout plus an append-only `app.log`.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub const DEFAULT_LOG_DIR: &str = "logs";
pub const APP_LOG: &str = "app.log";
pub const FAILED_FILES_LOG: &str = "failed_files.log";

/// Installs the global subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing(log_dir: &Path) -> Result<()> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let app_log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(APP_LOG))
        .with_context(|| format!("Failed to open {}", log_dir.join(APP_LOG).display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(app_log)),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(())
}
