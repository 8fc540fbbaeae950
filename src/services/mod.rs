//! Per-service downloaders.
//!
//! Each downloader turns its section of [`Config`](crate::Config) into a
//! sequence of URLs, fetches them one at a time through the shared
//! [`HttpClient`](crate::HttpClient) and hands every payload to the
//! [`store`](crate::store). Item-level problems (denied, rate limited,
//! missing data) are logged and counted; HTTP and storage failures abort
//! the run.

mod error;
pub mod gta;
pub mod mii;
pub mod roblox;

use std::path::Path;

use indicatif::ProgressBar;
use tracing::warn;

use crate::store::{Persisted, SlotPolicy, persist};

pub use error::ServiceError;
pub use gta::{GtaDownloader, GtaEndpoints};
pub use mii::{MiiDownloader, MiiEndpoints, MiiExpression, MiiPose, MiiShading};
pub use roblox::{RobloxDownloader, RobloxEndpoints, RobloxPose};

/// Counts of what a run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    saved: u64,
    skipped: u64,
    failed: u64,
}

impl DownloadSummary {
    /// Creates an empty summary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of files written.
    #[must_use]
    pub fn saved(&self) -> u64 {
        self.saved
    }

    /// Returns the number of payloads already on disk.
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Returns the number of items that produced nothing.
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed
    }

    /// Returns the number of items processed.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.saved + self.skipped + self.failed
    }

    /// Adds the counts of `other`.
    pub fn merge(&mut self, other: Self) {
        self.saved += other.saved;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }

    pub(crate) fn record(&mut self, persisted: &Persisted) {
        match persisted {
            Persisted::Saved(_) => self.saved += 1,
            Persisted::Skipped(_) => self.skipped += 1,
            Persisted::Refused(_) => self.failed += 1,
        }
    }

    pub(crate) fn record_failure(&mut self) {
        self.failed += 1;
    }
}

/// Persists one payload, records it and advances the bar.
pub(crate) fn save(
    folder: &Path,
    file_name: &str,
    content: &[u8],
    summary: &mut DownloadSummary,
    progress: &ProgressBar,
) -> Result<(), ServiceError> {
    let persisted = persist(folder, file_name, content, SlotPolicy::KeepOriginal)?;
    summary.record(&persisted);
    progress.inc(1);
    Ok(())
}

/// Records an item failure and advances the bar by `units`.
pub(crate) fn fail(summary: &mut DownloadSummary, progress: &ProgressBar, units: u64) {
    for _ in 0..units {
        summary.record_failure();
    }
    progress.inc(units);
}

/// Logs an item-level error, or returns it if it must stop the run.
pub(crate) fn tolerate(error: ServiceError) -> Result<(), ServiceError> {
    if error.is_fatal() {
        return Err(error);
    }
    warn!(error = %error, "skipping item");
    Ok(())
}
