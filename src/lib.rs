//! Avatar Downloader Core Library
//!
//! This library fetches avatar renders from Mii, Roblox and GTA Online
//! services and stores them without duplicating content already on disk.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`download`] - HTTP fetcher with 403/429 classification and backoff
//! - [`store`] - Content fingerprints, free-name search and safe writes
//! - [`render`] - Frame-sheet splitting and GIF assembly
//! - [`services`] - Per-service URL enumeration and download runs
//! - [`config`] - TOML configuration
//! - [`progress`] - Progress bars for download runs

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod progress;
pub mod render;
pub mod services;
pub mod store;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::{Config, ConfigError, MiiSubject};
pub use download::{FetchError, FetchOutcome, FetchRequest, HttpClient, RateLimitPolicy};
pub use render::{RenderError, frames_to_gif, render_gif_from_frames, split_into_frames};
pub use services::{
    DownloadSummary, GtaDownloader, MiiDownloader, RobloxDownloader, ServiceError,
};
pub use store::{
    FileFingerprint, PlacementDecision, Persisted, SlotPolicy, StoreError, WriteOutcome,
    find_next_available_path, identical_or_same_size, is_identical, persist, write_file,
};
