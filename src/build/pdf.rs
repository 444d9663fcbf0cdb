//! Best-effort fixed-layout (PDF) side pipeline.
//!
//! Invokes an external LaTeX toolchain over an article's source directory.
//! No correctness guarantees beyond "succeeds or reports failure": a failed
//! compile is reported per-article and never aborts the batch.

use std::path::PathBuf;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::config::ArticleRecord;

/// External compiler invoked for fixed-layout output.
const LATEX_TOOL: &str = "latexmk";

/// Errors surfaced by the side pipeline.
#[derive(Debug, Error)]
pub enum PdfError {
    /// The manifest record carries no LaTeX source directory.
    #[error("no latex_dir configured for {article_id}")]
    NoSourceDir {
        /// The article without LaTeX sources.
        article_id: String,
    },

    /// The compiler process could not be spawned.
    #[error("failed to launch {LATEX_TOOL} in {dir}: {source}")]
    Launch {
        /// Working directory of the attempted compile.
        dir: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The compiler exited with a failure status.
    #[error("{LATEX_TOOL} exited with {status} for {article_id}")]
    CompileFailed {
        /// The article whose compile failed.
        article_id: String,
        /// The process exit status.
        status: std::process::ExitStatus,
    },
}

/// Compiles the article's LaTeX source into a PDF in its output directory.
///
/// # Errors
///
/// Returns [`PdfError`]; callers treat every variant as a per-article
/// report, not a batch failure.
#[instrument(skip(record), fields(article_id = %record.id))]
pub async fn compile_fixed_layout(record: &ArticleRecord) -> Result<(), PdfError> {
    let Some(latex_dir) = record.latex_dir.as_ref() else {
        return Err(PdfError::NoSourceDir {
            article_id: record.id.clone(),
        });
    };

    let output_dir = record
        .output_dir
        .canonicalize()
        .unwrap_or_else(|_| record.output_dir.clone());

    debug!(dir = %latex_dir.display(), "running fixed-layout compile");
    let status = Command::new(LATEX_TOOL)
        .arg("-pdf")
        .arg("-interaction=nonstopmode")
        .arg(format!("-output-directory={}", output_dir.display()))
        .arg("main.tex")
        .current_dir(latex_dir)
        .status()
        .await
        .map_err(|source| PdfError::Launch {
            dir: latex_dir.clone(),
            source,
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(PdfError::CompileFailed {
            article_id: record.id.clone(),
            status,
        })
    }
}
