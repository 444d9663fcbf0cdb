//! Error types for bundle persistence.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while writing or loading a bundle.
#[derive(Debug, Error)]
pub enum BundleError {
    /// File system error reading or writing the bundle.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Bundle could not be encoded to JSON.
    #[error("failed to serialize bundle: {source}")]
    Serialize {
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// Persisted record could not be decoded.
    #[error("failed to decode bundle: {source}")]
    Deserialize {
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

impl BundleError {
    /// Creates an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for BundleError {
    fn from(source: serde_json::Error) -> Self {
        Self::Serialize { source }
    }
}
