//! Log file setup.

use std::env;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::Result;

/// Name of the log file.
pub const LOG_FILE: &str = "sse-gui.log";

/// `Documents\My Games\Skyrim Special Edition\SKSE\sse-gui.log` under the
/// user profile, or `sse-gui.log` in the working directory when there is no
/// profile.
pub fn default_path() -> PathBuf {
    match env::var_os("USERPROFILE") {
        Some(profile) => PathBuf::from(profile)
            .join("Documents")
            .join("My Games")
            .join("Skyrim Special Edition")
            .join("SKSE")
            .join(LOG_FILE),
        None => PathBuf::from(LOG_FILE),
    }
}

/// Install the global subscriber, writing to `path`.
///
/// The filter defaults to `info` and can be overridden through `RUST_LOG`.
pub fn setup(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let log_file = File::create(path)?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_writer(Mutex::new(log_file))
                .with_ansi(false),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init()?;

    Ok(())
}
