//! Error types for the fetch module.
//!
//! Structured errors for all fetch operations, carrying enough context
//! (URL, path, last status) for batch-level logging and user feedback.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while fetching a remote resource.
///
/// A `FetchError` is only surfaced after the retry budget is exhausted;
/// it always describes the *last* failed attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS, timeout).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed to fetch.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// HTTP error response (any non-redirect, non-200 status).
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Redirect chain exceeded the hop limit.
    #[error("too many redirects ({hops}) fetching {url}")]
    TooManyRedirects {
        /// The URL whose redirect chain did not terminate.
        url: String,
        /// Number of hops followed before giving up.
        hops: usize,
    },

    /// A redirect response arrived without a usable Location header.
    #[error("redirect from {url} carried no Location header")]
    MissingLocation {
        /// The URL that responded with a bare redirect.
        url: String,
    },

    /// File system error while writing a fetched resource to disk.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl FetchError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a redirect-limit error.
    pub fn too_many_redirects(url: impl Into<String>, hops: usize) -> Self {
        Self::TooManyRedirects {
            url: url.into(),
            hops,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// True when another attempt could plausibly succeed.
    ///
    /// Invalid URLs and redirect anomalies never change between attempts,
    /// so retrying them only burns the budget.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::InvalidUrl { .. } | Self::TooManyRedirects { .. } | Self::MissingLocation { .. }
        )
    }
}

// Note on From trait implementations:
// We intentionally do NOT implement `From<reqwest::Error>` or `From<std::io::Error>`
// because our error variants require context (url, path) that the source errors
// don't provide. The helper constructor methods are the correct pattern here.
