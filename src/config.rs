//! Article manifest loading.
//!
//! The build pipeline is driven by a YAML manifest listing one record per
//! article. The pipeline consumes these records read-only; articles are
//! opt-in via `enabled: true`.
//!
//! ```yaml
//! articles:
//!   - id: "2301.01234"
//!     output_dir: research/stream-mem
//!     enabled: true
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

/// Where the manifest lives unless overridden on the command line.
pub const DEFAULT_MANIFEST_PATH: &str = "content/papers.yaml";

/// Errors that can occur while loading the manifest.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Manifest file could not be read.
    #[error("failed to read manifest {path}: {source}")]
    Io {
        /// The manifest path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Manifest is not valid YAML or has the wrong shape.
    #[error("failed to parse manifest {path}: {source}")]
    Parse {
        /// The manifest path.
        path: PathBuf,
        /// The underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },
}

/// One per-article configuration record.
///
/// Unknown manifest fields are tolerated and ignored, so the same file can
/// carry site-template metadata the pipeline has no interest in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ArticleRecord {
    /// External article identifier (arXiv id, optional version suffix).
    pub id: String,
    /// Directory the article's bundle and assets are written into.
    pub output_dir: PathBuf,
    /// Whether this article participates in the build. Opt-in.
    #[serde(default)]
    pub enabled: bool,
    /// Directory holding the article's LaTeX source, when the fixed-layout
    /// side pipeline should run for it.
    #[serde(default)]
    pub latex_dir: Option<PathBuf>,
}

/// The full article manifest.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Manifest {
    /// All article records, enabled or not.
    #[serde(default)]
    pub articles: Vec<ArticleRecord>,
}

impl Manifest {
    /// Loads and parses the manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on read or parse failure.
    #[instrument]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest = Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(
            total = manifest.articles.len(),
            enabled = manifest.enabled_articles().count(),
            "manifest loaded"
        );
        Ok(manifest)
    }

    /// Parses manifest YAML text.
    ///
    /// # Errors
    ///
    /// Returns the underlying YAML error for malformed input.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Iterates over the records that participate in the build.
    pub fn enabled_articles(&self) -> impl Iterator<Item = &ArticleRecord> {
        self.articles.iter().filter(|record| record.enabled)
    }
}
