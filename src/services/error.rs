//! Error types for the service downloaders.

use thiserror::Error;

use crate::download::FetchError;
use crate::store::StoreError;

/// Errors raised by the per-service downloaders.
///
/// [`NoData`](Self::NoData) and [`PendingTimeout`](Self::PendingTimeout)
/// concern a single item and are logged and counted as failures; the rest
/// abort the run.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service answered without the expected data.
    #[error("no data returned from {url}: {reason}")]
    NoData {
        /// Endpoint that was queried.
        url: String,
        /// What was missing.
        reason: String,
    },

    /// A render was still pending after every poll.
    #[error("render still pending after {attempts} checks: {url}")]
    PendingTimeout {
        /// Endpoint that was polled.
        url: String,
        /// Number of checks made.
        attempts: u32,
    },

    /// The HTTP request failed.
    #[error("request failed: {0}")]
    Fetch(#[from] FetchError),

    /// Saving a download failed.
    #[error("storage failed: {0}")]
    Store(#[from] StoreError),
}

impl ServiceError {
    /// Creates a no-data error.
    pub fn no_data(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NoData {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if the error should stop the whole run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Store(_))
    }
}
