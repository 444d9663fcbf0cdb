//! Error types for article extraction.

use thiserror::Error;

/// Errors that can occur while extracting the article body.
///
/// Extraction failure is fatal for that article's build; the batch logs it
/// and moves on to siblings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    /// The page contained no recognizable article container.
    #[error("no recognizable article container in page markup")]
    NoArticleContainer,
}
