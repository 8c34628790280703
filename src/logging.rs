//! Logging setup
//!
//! Installs the global `tracing` subscriber, writing either to stderr or to
//! an append-mode log file.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, EnvFilter};

use crate::error::Result;

const DEFAULT_FILTER: &str = "info,relaykv=debug";

/// Open (or create) the log file in append mode
pub fn open_log_file(path: &Path) -> Result<File> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize tracing/logging for the process
///
/// Fails if the log file cannot be opened. Calling it twice is harmless;
/// the second subscriber is ignored.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    match log_file {
        Some(path) => {
            let file = open_log_file(path)?;
            let _ = fmt()
                .with_env_filter(env_filter())
                .with_target(true)
                .with_thread_names(true)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = fmt()
                .with_env_filter(env_filter())
                .with_target(true)
                .with_thread_names(true)
                .with_writer(io::stderr)
                .try_init();
        }
    }
    Ok(())
}
