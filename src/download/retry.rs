//! Rate-limit backoff for throttled fetches.
//!
//! This module provides the [`RateLimitPolicy`] which decides, for each
//! HTTP 429 response, whether the fetcher should wait and retry or give up,
//! and the [`Sleeper`] seam through which the wait is performed.
//!
//! # Overview
//!
//! - The wait is taken from the `Retry-After` header when it holds an integer
//!   number of seconds, and from a fixed fallback otherwise.
//! - A request is retried at most `max_retries` times; the next 429 after that
//!   ends the fetch as exhausted.
//! - Only 429 is retried. Every other failure is either a final outcome
//!   (403) or fatal.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use avatar_downloader_core::download::{RateLimitDecision, RateLimitPolicy};
//!
//! let policy = RateLimitPolicy::default();
//! match policy.on_rate_limited(0, Some("2")) {
//!     RateLimitDecision::Wait { delay, retry } => {
//!         assert_eq!(delay, Duration::from_secs(2));
//!         assert_eq!(retry, 1);
//!     }
//!     RateLimitDecision::GiveUp { .. } => unreachable!(),
//! }
//! ```

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use super::constants::{
    DEFAULT_MAX_RATE_LIMIT_RETRIES, DEFAULT_RATE_LIMIT_FALLBACK, MAX_RETRY_AFTER,
};

/// Decision taken after a rate-limited response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Wait for `delay`, then issue retry number `retry` (1-indexed).
    Wait {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which retry this will be.
        retry: u32,
    },

    /// Stop retrying; the fetch is exhausted.
    GiveUp {
        /// Number of retries that were performed.
        retries: u32,
    },
}

/// Backoff configuration for HTTP 429 responses.
///
/// # Default Values
///
/// - `max_retries`: 5
/// - `fallback_delay`: 10 seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Maximum number of retries after the initial attempt.
    max_retries: u32,

    /// Wait used when `Retry-After` is missing or not an integer.
    fallback_delay: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RATE_LIMIT_RETRIES,
            fallback_delay: DEFAULT_RATE_LIMIT_FALLBACK,
        }
    }
}

impl RateLimitPolicy {
    /// Creates a policy with custom settings.
    #[must_use]
    pub fn new(max_retries: u32, fallback_delay: Duration) -> Self {
        Self {
            max_retries,
            fallback_delay,
        }
    }

    /// Returns the configured retry cap.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the fallback wait.
    #[must_use]
    pub fn fallback_delay(&self) -> Duration {
        self.fallback_delay
    }

    /// Decides what to do after a 429.
    ///
    /// # Arguments
    ///
    /// * `retries_so_far` - Retries already performed for this request
    /// * `retry_after` - Raw `Retry-After` header value, if any
    #[instrument(skip(self), fields(max_retries = self.max_retries))]
    pub fn on_rate_limited(&self, retries_so_far: u32, retry_after: Option<&str>) -> RateLimitDecision {
        if retries_so_far >= self.max_retries {
            debug!(retries_so_far, "rate-limit retries exhausted");
            return RateLimitDecision::GiveUp {
                retries: retries_so_far,
            };
        }

        let delay = retry_after
            .and_then(parse_retry_after)
            .unwrap_or(self.fallback_delay);

        RateLimitDecision::Wait {
            delay,
            retry: retries_so_far + 1,
        }
    }
}

/// Parses a `Retry-After` header holding a non-negative integer of seconds.
///
/// HTTP-date values and negative numbers are not honored and return `None`,
/// so the caller falls back to its fixed delay. Values above one hour are
/// capped.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    let Ok(seconds) = header_value.parse::<i64>() else {
        debug!(header_value, "non-integer Retry-After value");
        return None;
    };

    if seconds < 0 {
        debug!(seconds, "negative Retry-After value, ignoring");
        return None;
    }

    #[allow(clippy::cast_sign_loss)]
    let duration = Duration::from_secs(seconds as u64);

    if duration > MAX_RETRY_AFTER {
        warn!(
            seconds,
            max_seconds = MAX_RETRY_AFTER.as_secs(),
            "Retry-After exceeds maximum, capping at 1 hour"
        );
        return Some(MAX_RETRY_AFTER);
    }

    Some(duration)
}

/// Performs the backoff wait.
///
/// The production implementation is [`TokioSleeper`]. Tests substitute a
/// recording implementation so waits can be counted without real delays.
#[async_trait]
pub trait Sleeper: Debug + Send + Sync {
    /// Suspends the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
