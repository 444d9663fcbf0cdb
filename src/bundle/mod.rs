//! Persisted article bundles.
//!
//! A bundle is the durable artifact of the build stage: one structured JSON
//! record per article holding the normalized body markup, the extracted
//! stylesheet text, and provenance metadata. Written once per build unless a
//! force-rebuild is requested; read once per reader-stage load.
//!
//! Invariant: once written, `body_markup` contains only relative asset
//! references, never remote URLs.

mod error;

pub use error::BundleError;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::mirror::MirrorKind;

/// Filename of the persisted bundle within an article's output directory.
pub const BUNDLE_FILENAME: &str = "bundle.json";

/// Self-contained build output for one article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArticleBundle {
    /// Normalized article body with local-relative asset references.
    pub body_markup: String,
    /// Concatenated stylesheet text extracted from the source page.
    pub stylesheet_text: String,
    /// The external article identifier.
    pub article_id: String,
    /// Which mirror served the source page ("primary" or "secondary").
    pub mirror_used: String,
    /// When the bundle was generated.
    pub generated_at: DateTime<Utc>,
}

impl ArticleBundle {
    /// Creates a bundle stamped with the current time.
    #[must_use]
    pub fn new(
        article_id: impl Into<String>,
        mirror_used: MirrorKind,
        body_markup: impl Into<String>,
        stylesheet_text: impl Into<String>,
    ) -> Self {
        Self {
            body_markup: body_markup.into(),
            stylesheet_text: stylesheet_text.into(),
            article_id: article_id.into(),
            mirror_used: mirror_used.as_str().to_string(),
            generated_at: Utc::now(),
        }
    }

    /// Path of the bundle file within an article output directory.
    #[must_use]
    pub fn path_for(output_dir: &Path) -> PathBuf {
        output_dir.join(BUNDLE_FILENAME)
    }

    /// True when a bundle already exists in the output directory.
    #[must_use]
    pub fn exists_in(output_dir: &Path) -> bool {
        Self::path_for(output_dir).is_file()
    }

    /// Serializes the bundle to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::Serialize`] if encoding fails.
    pub fn to_json(&self) -> Result<String, BundleError> {
        serde_json::to_string_pretty(self).map_err(BundleError::from)
    }

    /// Decodes a bundle from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::Deserialize`] for malformed records.
    pub fn from_json(text: &str) -> Result<Self, BundleError> {
        serde_json::from_str(text).map_err(|source| BundleError::Deserialize { source })
    }

    /// Writes the bundle into the article's output directory, creating
    /// parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError`] on serialization or IO failure.
    #[instrument(skip(self), fields(article_id = %self.article_id))]
    pub async fn write(&self, output_dir: &Path) -> Result<PathBuf, BundleError> {
        let path = Self::path_for(output_dir);
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|source| BundleError::io(output_dir, source))?;

        let json = self.to_json()?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|source| BundleError::io(&path, source))?;

        info!(path = %path.display(), "bundle written");
        Ok(path)
    }

    /// Loads a bundle from disk.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError`] on IO or decoding failure.
    #[instrument]
    pub async fn load(path: &Path) -> Result<Self, BundleError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| BundleError::io(path, source))?;
        Self::from_json(&text)
    }
}
