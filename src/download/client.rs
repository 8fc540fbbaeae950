//! HTTP fetcher with rate-limit handling.
//!
//! This module provides the [`HttpClient`] struct which issues a single GET
//! (optionally carrying a JSON body), classifies the response and retries
//! throttled requests according to a [`RateLimitPolicy`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use super::constants::REQUEST_TIMEOUT_SECS;
use super::error::FetchError;
use super::retry::{RateLimitDecision, RateLimitPolicy, Sleeper, TokioSleeper};

/// User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// A single fetch: a URL plus an optional JSON payload.
///
/// The payload is used by batch lookup endpoints that accept a JSON document
/// describing which records to return.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    url: String,
    body: Option<Value>,
}

impl FetchRequest {
    /// Creates a plain GET request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: None,
        }
    }

    /// Creates a GET request carrying `body` as its JSON payload.
    #[must_use]
    pub fn with_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            url: url.into(),
            body: Some(body),
        }
    }

    /// Returns the request URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the JSON payload, if any.
    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

/// Payload of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBody {
    /// Raw response bytes.
    pub bytes: Vec<u8>,
    /// The `Content-Type` header, when the server sent one.
    pub content_type: Option<String>,
}

impl FetchedBody {
    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] when the body is not JSON.
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.bytes)
    }
}

/// Classified result of a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// 2xx response.
    Success(FetchedBody),
    /// HTTP 403. Not retried; the resource cannot be obtained.
    Denied,
    /// HTTP 429 persisted past the retry cap.
    Exhausted,
}

impl FetchOutcome {
    /// Returns the body for `Success`, `None` otherwise.
    #[must_use]
    pub fn into_body(self) -> Option<FetchedBody> {
        match self {
            Self::Success(body) => Some(body),
            Self::Denied | Self::Exhausted => None,
        }
    }
}

/// HTTP client for fetching images and JSON documents.
///
/// Create it once and reuse it for every request of a run to benefit from
/// connection pooling. Requests are issued one at a time; the only time the
/// caller is suspended beyond the request itself is the rate-limit wait.
///
/// # Example
///
/// ```no_run
/// use avatar_downloader_core::download::HttpClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new()?;
/// if let Some(bytes) = client.fetch_bytes("https://example.com/avatar.png", None).await? {
///     println!("fetched {} bytes", bytes.len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    policy: RateLimitPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl HttpClient {
    /// Creates a client with the default 10 second timeout and rate-limit policy.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if the underlying client cannot be built.
    pub fn new() -> Result<Self, FetchError> {
        Self::new_with_timeout(REQUEST_TIMEOUT_SECS)
    }

    /// Creates a client with an explicit per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if the underlying client cannot be built.
    pub fn new_with_timeout(timeout_secs: u64) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(DEFAULT_USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|source| FetchError::ClientBuild { source })?;
        Ok(Self {
            client,
            policy: RateLimitPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replaces the rate-limit policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RateLimitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the component that performs backoff waits.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Returns the active rate-limit policy.
    #[must_use]
    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    /// Returns the component that performs waits, for callers that poll.
    #[must_use]
    pub fn sleeper(&self) -> &Arc<dyn Sleeper> {
        &self.sleeper
    }

    /// Fetches `request`, retrying on HTTP 429.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if:
    /// - The URL is invalid
    /// - The request fails (network error, timeout)
    /// - The server returns a status other than 2xx, 403 or 429
    #[instrument(skip(self, request), fields(url = %request.url()))]
    pub async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, FetchError> {
        let url = request.url();
        Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;

        let mut retries = 0;
        loop {
            let response = self.send(request).await?;
            let status = response.status();

            if status.is_success() {
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(std::string::ToString::to_string);
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| FetchError::from_transport(url, e))?;
                debug!(bytes = bytes.len(), retries, "fetch succeeded");
                return Ok(FetchOutcome::Success(FetchedBody {
                    bytes: bytes.to_vec(),
                    content_type,
                }));
            }

            match status.as_u16() {
                403 => {
                    debug!("access denied");
                    return Ok(FetchOutcome::Denied);
                }
                429 => {
                    let retry_after = response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .map(std::string::ToString::to_string);
                    match self.policy.on_rate_limited(retries, retry_after.as_deref()) {
                        RateLimitDecision::Wait { delay, retry } => {
                            warn!(
                                delay_secs = delay.as_secs(),
                                attempt = retry,
                                max_retries = self.policy.max_retries(),
                                "429 Too Many Requests, pausing before retry"
                            );
                            self.sleeper.sleep(delay).await;
                            retries = retry;
                        }
                        RateLimitDecision::GiveUp { retries } => {
                            warn!(retries, "exceeded maximum rate-limit retries");
                            return Ok(FetchOutcome::Exhausted);
                        }
                    }
                }
                code => return Err(FetchError::http_status(url, code)),
            }
        }
    }

    /// Fetches `url` and returns its bytes, or `None` if denied or exhausted.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`fetch`](Self::fetch).
    pub async fn fetch_bytes(
        &self,
        url: &str,
        body: Option<Value>,
    ) -> Result<Option<Vec<u8>>, FetchError> {
        let outcome = self.fetch(&build_request(url, body)).await?;
        Ok(outcome.into_body().map(|body| body.bytes))
    }

    /// Fetches `url` and decodes it as JSON, or `None` if denied or exhausted.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`fetch`](Self::fetch), plus
    /// [`FetchError::Decode`] when a successful body is not JSON.
    pub async fn fetch_json(
        &self,
        url: &str,
        body: Option<Value>,
    ) -> Result<Option<Value>, FetchError> {
        let outcome = self.fetch(&build_request(url, body)).await?;
        outcome
            .into_body()
            .map(|body| body.json().map_err(|e| FetchError::decode(url, e)))
            .transpose()
    }

    async fn send(&self, request: &FetchRequest) -> Result<reqwest::Response, FetchError> {
        let mut builder = self.client.get(request.url());
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }
        builder
            .send()
            .await
            .map_err(|e| FetchError::from_transport(request.url(), e))
    }
}

fn build_request(url: &str, body: Option<Value>) -> FetchRequest {
    match body {
        Some(body) => FetchRequest::with_json(url, body),
        None => FetchRequest::get(url),
    }
}
