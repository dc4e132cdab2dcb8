//! Settings errors.

use std::path::PathBuf;

use thiserror::Error;

/// Failure while loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid JSON for [`crate::HuddleSettings`].
    #[error("invalid settings JSON in {path}: {source}")]
    Json {
        /// File that failed.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SettingsError>;
