//! Mirror selection and fallback for article page retrieval.
//!
//! Rendered arXiv articles are served by more than one host, each with its
//! own asset-referencing convention. This module provides:
//!
//! - [`Mirror`] - Async trait that individual mirrors implement
//! - [`MirrorResolver`] - Preferred-then-fallback resolution into a [`RawDocument`]
//! - [`MirrorConvention`] - Tagged variant carrying the asset-reference
//!   pattern and remote URL construction for the chosen mirror
//!
//! The convention is selected once, at resolution time, and travels with the
//! document. Downstream stages must use it rather than re-detecting the
//! reference style from markup.
//!
//! # Example
//!
//! ```no_run
//! use paperbundle::fetch::{FetchClient, FetchPolicy};
//! use paperbundle::mirror::MirrorResolver;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = FetchClient::new(FetchPolicy::default());
//! let resolver = MirrorResolver::with_default_mirrors(client);
//! let raw = resolver.fetch_article("2301.01234").await?;
//! println!("fetched via {:?}", raw.mirror_used);
//! # Ok(())
//! # }
//! ```

mod convention;
mod error;

pub use convention::MirrorConvention;
pub use error::MirrorError;

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::fetch::FetchClient;

/// Default primary mirror host (ar5iv-style rendering).
pub const PRIMARY_BASE_URL: &str = "https://ar5iv.labs.arxiv.org";

/// Default secondary mirror host (native arXiv HTML rendering).
pub const SECONDARY_BASE_URL: &str = "https://arxiv.org";

#[allow(clippy::expect_used)]
static ARTICLE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d{4}\.\d{4,5})(?:v\d+)?$").expect("article id regex is valid")
});

/// Which mirror ultimately served the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorKind {
    /// The preferred mirror.
    Primary,
    /// The fallback mirror.
    Secondary,
}

impl MirrorKind {
    /// Stable lowercase name used in the persisted bundle.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

/// Full-page markup retrieved from one mirror.
///
/// Produced once per build and discarded after extraction. Carries the
/// asset-reference convention of the mirror that served it.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// The full page markup as served.
    pub markup: String,
    /// Which mirror served the page.
    pub mirror_used: MirrorKind,
    /// Asset-reference convention of that mirror.
    pub convention: MirrorConvention,
}

/// Trait that all mirrors implement.
///
/// # Object Safety
///
/// This trait uses `async_trait` to support dynamic dispatch via
/// `Box<dyn Mirror>`. Rust 2024 native async traits are not object-safe,
/// so `async_trait` is required for the resolver's fallback chain.
#[async_trait]
pub trait Mirror: Send + Sync {
    /// Returns the mirror's name (e.g., "ar5iv", "arxiv-html").
    fn name(&self) -> &str;

    /// Returns which slot this mirror occupies in the fallback order.
    fn kind(&self) -> MirrorKind;

    /// Returns the asset-reference convention this mirror's pages follow.
    fn convention(&self) -> MirrorConvention;

    /// Builds the article page URL for the given article id.
    fn page_url(&self, article_id: &str) -> String;

    /// Fetches the article page markup.
    async fn fetch_page(
        &self,
        client: &FetchClient,
        article_id: &str,
    ) -> Result<String, crate::fetch::FetchError> {
        client.fetch_text(&self.page_url(article_id)).await
    }
}

/// Primary mirror: ar5iv-style rendering with path-qualified asset refs
/// (`src="/html/<id>/assets/<file>"`).
#[derive(Debug, Clone)]
pub struct ArxivLabsMirror {
    base_url: String,
}

impl Default for ArxivLabsMirror {
    fn default() -> Self {
        Self::new(PRIMARY_BASE_URL)
    }
}

impl ArxivLabsMirror {
    /// Creates the mirror against a custom base URL (tests use a mock server).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Mirror for ArxivLabsMirror {
    fn name(&self) -> &'static str {
        "ar5iv"
    }

    fn kind(&self) -> MirrorKind {
        MirrorKind::Primary
    }

    fn convention(&self) -> MirrorConvention {
        MirrorConvention::path_qualified(&self.base_url)
    }

    fn page_url(&self, article_id: &str) -> String {
        format!("{}/html/{article_id}", self.base_url)
    }
}

/// Secondary mirror: native arXiv HTML rendering with bare relative asset
/// filenames (`src="figs/plot.png"`).
#[derive(Debug, Clone)]
pub struct ArxivNativeMirror {
    base_url: String,
}

impl Default for ArxivNativeMirror {
    fn default() -> Self {
        Self::new(SECONDARY_BASE_URL)
    }
}

impl ArxivNativeMirror {
    /// Creates the mirror against a custom base URL (tests use a mock server).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Mirror for ArxivNativeMirror {
    fn name(&self) -> &'static str {
        "arxiv-html"
    }

    fn kind(&self) -> MirrorKind {
        MirrorKind::Secondary
    }

    fn convention(&self) -> MirrorConvention {
        // Bare refs resolve against the article page directory.
        MirrorConvention::bare_filename(format!("{}/html", self.base_url))
    }

    fn page_url(&self, article_id: &str) -> String {
        format!("{}/html/{article_id}", self.base_url)
    }
}

/// Preferred-then-fallback mirror resolution.
pub struct MirrorResolver {
    preferred: Box<dyn Mirror>,
    fallback: Box<dyn Mirror>,
    client: FetchClient,
}

impl MirrorResolver {
    /// Creates a resolver over an explicit mirror pair.
    #[must_use]
    pub fn new(preferred: Box<dyn Mirror>, fallback: Box<dyn Mirror>, client: FetchClient) -> Self {
        Self {
            preferred,
            fallback,
            client,
        }
    }

    /// Creates a resolver over the default production mirrors.
    #[must_use]
    pub fn with_default_mirrors(client: FetchClient) -> Self {
        Self::new(
            Box::new(ArxivLabsMirror::default()),
            Box::new(ArxivNativeMirror::default()),
            client,
        )
    }

    /// Fetches the article page, trying the preferred mirror first.
    ///
    /// The preferred mirror gets its full retry budget before the fallback
    /// is consulted. The returned [`RawDocument`] records which mirror won
    /// and that mirror's asset convention.
    ///
    /// # Errors
    ///
    /// [`MirrorError::InvalidArticleId`] for malformed ids;
    /// [`MirrorError::AllMirrorsFailed`] naming both causes when neither
    /// mirror could serve the page.
    #[instrument(skip(self), fields(article_id = %article_id))]
    pub async fn fetch_article(&self, article_id: &str) -> Result<RawDocument, MirrorError> {
        let article_id = normalize_article_id(article_id)
            .ok_or_else(|| MirrorError::invalid_article_id(article_id))?;

        let preferred_cause = match self.preferred.fetch_page(&self.client, &article_id).await {
            Ok(markup) => {
                info!(mirror = self.preferred.name(), "article page fetched");
                return Ok(RawDocument {
                    markup,
                    mirror_used: self.preferred.kind(),
                    convention: self.preferred.convention(),
                });
            }
            Err(error) => {
                warn!(
                    mirror = self.preferred.name(),
                    error = %error,
                    "preferred mirror failed, trying fallback"
                );
                error
            }
        };

        match self.fallback.fetch_page(&self.client, &article_id).await {
            Ok(markup) => {
                info!(mirror = self.fallback.name(), "article page fetched via fallback");
                Ok(RawDocument {
                    markup,
                    mirror_used: self.fallback.kind(),
                    convention: self.fallback.convention(),
                })
            }
            Err(fallback_cause) => Err(MirrorError::all_mirrors_failed(
                &article_id,
                self.preferred.name(),
                preferred_cause,
                self.fallback.name(),
                fallback_cause,
            )),
        }
    }
}

/// Validates and trims an article id, accepting an optional version suffix.
fn normalize_article_id(candidate: &str) -> Option<String> {
    let trimmed = candidate.trim();
    if ARTICLE_ID_RE.is_match(trimmed) {
        Some(trimmed.to_string())
    } else {
        None
    }
}
