//! Constants for the fetch module (timeouts, rate-limit backoff).

use std::time::Duration;

/// Default per-request timeout (10 seconds).
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default number of retries after an HTTP 429.
pub const DEFAULT_MAX_RATE_LIMIT_RETRIES: u32 = 5;

/// Wait used when a 429 carries no usable `Retry-After` header.
pub const DEFAULT_RATE_LIMIT_FALLBACK: Duration = Duration::from_secs(10);

/// Maximum Retry-After header value (1 hour) to prevent excessive delays.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);
