//! Bounded-retry, redirect-following resource fetching.
//!
//! This module provides the [`FetchClient`] used by everything downstream of
//! the build pipeline: mirror page fetches, asset downloads, and bundle loads
//! in the reader stage.
//!
//! # Retry model
//!
//! A fetch is attempted exactly `retries + 1` times with a *fixed*
//! inter-attempt delay (no exponential backoff). A 301/302 response
//! is followed transparently and does not consume an attempt; any other
//! non-200 status or network-level error consumes one. The surfaced
//! [`FetchError`] always describes the last attempt.
//!
//! # Example
//!
//! ```no_run
//! use paperbundle::fetch::{FetchClient, FetchPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = FetchClient::new(FetchPolicy::default());
//! let html = client.fetch_text("https://ar5iv.labs.arxiv.org/html/2301.01234").await?;
//! println!("{} bytes of markup", html.len());
//! # Ok(())
//! # }
//! ```

mod error;

pub use error::FetchError;

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{Client, ClientBuilder, Response, redirect};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument, warn};
use url::Url;

/// Default number of retries after the initial attempt.
pub const DEFAULT_RETRIES: u32 = 3;

/// Default fixed delay between attempts (1 second).
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Maximum redirect hops followed within a single attempt.
///
/// Redirects are free (they never consume a retry attempt), so an explicit
/// hop cap is what prevents a redirect loop from hanging an attempt forever.
const MAX_REDIRECT_HOPS: usize = 10;

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Read timeout in seconds.
const READ_TIMEOUT_SECS: u64 = 120;

/// Retry configuration for the fetcher.
///
/// # Default Values
///
/// - `retries`: 3 (so 4 attempts total)
/// - `delay`: 1000 ms, fixed between attempts
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    retries: u32,
    delay: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl FetchPolicy {
    /// Creates a policy with explicit retry count and inter-attempt delay.
    #[must_use]
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    /// Creates a policy with a custom retry count and the default delay.
    #[must_use]
    pub fn with_retries(retries: u32) -> Self {
        Self {
            retries,
            ..Self::default()
        }
    }

    /// Returns the configured retry count (attempts are `retries + 1`).
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Returns the fixed inter-attempt delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

/// HTTP fetcher with bounded retries and manual redirect handling.
///
/// Created once and reused; the underlying `reqwest::Client` pools
/// connections. Redirect following is disabled at the client level so the
/// fetcher can follow 301/302 itself without the hop counting interfering
/// with the retry budget.
#[derive(Debug, Clone)]
pub struct FetchClient {
    client: Client,
    policy: FetchPolicy,
}

impl Default for FetchClient {
    fn default() -> Self {
        Self::new(FetchPolicy::default())
    }
}

impl FetchClient {
    /// Creates a new fetch client with the given retry policy.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(policy: FetchPolicy) -> Self {
        let client = ClientBuilder::new()
            .redirect(redirect::Policy::none())
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .read_timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .gzip(true)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client, policy }
    }

    /// Returns the retry policy in effect.
    #[must_use]
    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// Fetches a URL into memory as text.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] once the retry budget is exhausted, carrying
    /// the last status code or network error.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        self.with_retries(url, || async {
            let response = self.get_following_redirects(url).await?;
            response
                .text()
                .await
                .map_err(|source| FetchError::network(url, source))
        })
        .await
    }

    /// Fetches a URL into a file sink.
    ///
    /// A partial file left by a failed attempt is removed before the next
    /// attempt (and after the final failure) so no corrupt residue persists.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] once the retry budget is exhausted.
    #[instrument(skip(self), fields(url = %url, dest = %dest.display()))]
    pub async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        self.with_retries(url, || async {
            let result = self.stream_to_file(url, dest).await;
            if result.is_err() {
                remove_partial(dest).await;
            }
            result
        })
        .await
    }

    /// Runs one attempt closure under the retry policy.
    ///
    /// Exactly `retries + 1` attempts are made; the error from the last
    /// attempt is the one surfaced.
    async fn with_retries<T, F, Fut>(&self, url: &str, attempt_fn: F) -> Result<T, FetchError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let attempts = self.policy.retries + 1;
        let mut last_error = None;

        for attempt in 1..=attempts {
            match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !error.is_retryable() {
                        return Err(error);
                    }
                    warn!(
                        url,
                        attempt,
                        remaining = attempts - attempt,
                        error = %error,
                        "fetch attempt failed"
                    );
                    last_error = Some(error);
                    if attempt < attempts {
                        tokio::time::sleep(self.policy.delay).await;
                    }
                }
            }
        }

        // attempts >= 1, so last_error is always populated here
        Err(last_error.unwrap_or_else(|| FetchError::invalid_url(url)))
    }

    /// Issues a GET, following 301/302 redirects up to the hop cap.
    ///
    /// Redirect hops inherit the current attempt: they never consume retry
    /// budget. Any non-redirect, non-200 status becomes an error.
    async fn get_following_redirects(&self, url: &str) -> Result<Response, FetchError> {
        let mut current = Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;

        for hop in 0..MAX_REDIRECT_HOPS {
            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(|source| FetchError::network(current.as_str(), source))?;

            let status = response.status().as_u16();
            match status {
                200 => return Ok(response),
                301 | 302 => {
                    let location = response
                        .headers()
                        .get(reqwest::header::LOCATION)
                        .and_then(|value| value.to_str().ok())
                        .ok_or_else(|| FetchError::MissingLocation {
                            url: current.to_string(),
                        })?;
                    let next = current
                        .join(location)
                        .map_err(|_| FetchError::invalid_url(location))?;
                    debug!(from = %current, to = %next, hop, "following redirect");
                    current = next;
                }
                status => return Err(FetchError::http_status(current.as_str(), status)),
            }
        }

        Err(FetchError::too_many_redirects(url, MAX_REDIRECT_HOPS))
    }

    /// Streams one response body to `dest`.
    async fn stream_to_file(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        let response = self.get_following_redirects(url).await?;

        let file = File::create(dest)
            .await
            .map_err(|source| FetchError::io(dest, source))?;
        let mut writer = BufWriter::new(file);

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| FetchError::network(url, source))?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|source| FetchError::io(dest, source))?;
        }

        writer
            .flush()
            .await
            .map_err(|source| FetchError::io(dest, source))?;
        Ok(())
    }
}

/// Deletes a partial download, ignoring failures (the file may not exist).
async fn remove_partial(dest: &Path) {
    if tokio::fs::remove_file(dest).await.is_ok() {
        debug!(dest = %dest.display(), "removed partial download");
    }
}
