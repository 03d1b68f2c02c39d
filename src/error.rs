//! Error type shared by every library boundary.

use std::io;

use thiserror::Error;

/// Failures surfaced by install, bind and configuration paths.
///
/// Hot paths (trampolines, proxies) never return this type to the host; they
/// log and forward the native result code instead.
#[derive(Debug, Error)]
pub enum Error {
    /// A detour could not be resolved, created or toggled.
    #[error("unable to detour {target}: {reason}")]
    Detour {
        /// The `Symbol@module.dll` identifier or hook name.
        target: String,
        /// Human readable cause.
        reason: String,
    },
    /// No recorded device pairs with the host window.
    #[error("host graphics context not found")]
    HostNotFound,
    /// A lifecycle step ran before the hooks it depends on were installed.
    #[error("hooks are not installed")]
    NotInstalled,
    /// A native call succeeded but handed back a null interface.
    #[error("{0} returned a null interface")]
    NullInterface(&'static str),
    /// The settings file could not be parsed.
    #[error("invalid settings: {0}")]
    Settings(#[from] serde_json::Error),
    /// The log subscriber could not be installed.
    #[error("unable to set up logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Failure reported by a Win32 or COM call.
    #[cfg(windows)]
    #[error(transparent)]
    Windows(#[from] windows::core::Error),
}

impl Error {
    pub(crate) fn detour(target: impl Into<String>, reason: impl ToString) -> Self {
        Error::Detour { target: target.into(), reason: reason.to_string() }
    }
}

/// Result alias over [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
