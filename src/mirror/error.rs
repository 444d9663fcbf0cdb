//! Error types for mirror resolution.

use thiserror::Error;

use crate::fetch::FetchError;

/// Errors that can occur while resolving an article through the mirrors.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The article id does not match a recognized arXiv id shape.
    #[error("invalid article id: {article_id}")]
    InvalidArticleId {
        /// The rejected id string.
        article_id: String,
    },

    /// Both mirrors exhausted their retries; names both failure causes.
    #[error(
        "all mirrors failed for {article_id}: {preferred_name}: {preferred_cause}; {fallback_name}: {fallback_cause}"
    )]
    AllMirrorsFailed {
        /// The article that could not be fetched.
        article_id: String,
        /// Name of the preferred mirror.
        preferred_name: String,
        /// Why the preferred mirror failed.
        #[source]
        preferred_cause: FetchError,
        /// Name of the fallback mirror.
        fallback_name: String,
        /// Why the fallback mirror failed.
        fallback_cause: FetchError,
    },
}

impl MirrorError {
    /// Creates an invalid article id error.
    pub fn invalid_article_id(article_id: impl Into<String>) -> Self {
        Self::InvalidArticleId {
            article_id: article_id.into(),
        }
    }

    /// Creates a combined both-mirrors-failed error.
    pub fn all_mirrors_failed(
        article_id: impl Into<String>,
        preferred_name: impl Into<String>,
        preferred_cause: FetchError,
        fallback_name: impl Into<String>,
        fallback_cause: FetchError,
    ) -> Self {
        Self::AllMirrorsFailed {
            article_id: article_id.into(),
            preferred_name: preferred_name.into(),
            preferred_cause,
            fallback_name: fallback_name.into(),
            fallback_cause,
        }
    }
}
