//! HTTP fetcher for image and JSON endpoints.
//!
//! This module issues GET requests against fully-formed URLs and classifies
//! each response so that callers only ever see one of three outcomes, or a
//! fatal error.
//!
//! # Features
//!
//! - Fixed per-request timeout (10s by default)
//! - Optional JSON payload for batch lookup endpoints
//! - HTTP 403 reported as [`FetchOutcome::Denied`] without retry
//! - HTTP 429 retried after `Retry-After` (or a 10s fallback), at most 5 times
//! - Any other non-2xx status surfaced as [`FetchError::HttpStatus`]
//!
//! # Example
//!
//! ```no_run
//! use avatar_downloader_core::download::{FetchOutcome, FetchRequest, HttpClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new()?;
//! match client.fetch(&FetchRequest::get("https://example.com/avatar.png")).await? {
//!     FetchOutcome::Success(body) => println!("{} bytes", body.bytes.len()),
//!     FetchOutcome::Denied => println!("access denied"),
//!     FetchOutcome::Exhausted => println!("rate limited"),
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;
mod retry;

pub use client::{DEFAULT_USER_AGENT, FetchOutcome, FetchRequest, FetchedBody, HttpClient};
pub use constants::{
    DEFAULT_MAX_RATE_LIMIT_RETRIES, DEFAULT_RATE_LIMIT_FALLBACK, REQUEST_TIMEOUT_SECS,
};
pub use error::FetchError;
pub use retry::{RateLimitDecision, RateLimitPolicy, Sleeper, TokioSleeper, parse_retry_after};
