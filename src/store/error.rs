//! Error types for the store module.

use std::path::PathBuf;

use thiserror::Error;

/// Filesystem errors raised while fingerprinting, placing or writing files.
///
/// Refusing to overwrite an existing file is not an error; see
/// [`WriteOutcome::RefusedExisting`](super::WriteOutcome::RefusedExisting).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading, creating or writing a path failed.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Moving the previous occupant aside under the take-over policy failed.
    #[error("failed to rename {from} to {to}: {source}")]
    Rename {
        /// The file being moved aside.
        from: PathBuf,
        /// The numbered slot it was moved to.
        to: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a rename error.
    pub fn rename(from: impl Into<PathBuf>, to: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Rename {
            from: from.into(),
            to: to.into(),
            source,
        }
    }
}
