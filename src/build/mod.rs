//! Batch build pipeline: manifest in, one bundle per article out.
//!
//! Each enabled article runs as its own task, bounded by a semaphore.
//! Articles share no mutable state beyond the conventional "bundle already
//! exists, skip unless forced" check against their own output directories,
//! so no cross-article locking is needed. A per-article failure is logged
//! with the article and stage, counted, and never stops siblings.
//!
//! # Example
//!
//! ```no_run
//! use paperbundle::build::{BatchBuilder, BuildOptions};
//! use paperbundle::config::Manifest;
//! use paperbundle::fetch::{FetchClient, FetchPolicy};
//! use paperbundle::mirror::MirrorResolver;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manifest = Manifest::load(Path::new("data/papers.yaml"))?;
//! let client = FetchClient::new(FetchPolicy::default());
//! let resolver = MirrorResolver::with_default_mirrors(client.clone());
//! let builder = BatchBuilder::new(resolver, client, BuildOptions::default());
//! let stats = builder.run(&manifest).await;
//! println!("{} built, {} skipped, {} failed", stats.built(), stats.skipped(), stats.failed());
//! # Ok(())
//! # }
//! ```

pub mod pdf;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{error, info, instrument, warn};

use crate::assets::{AssetReport, localize_assets};
use crate::bundle::{ArticleBundle, BundleError};
use crate::config::{ArticleRecord, Manifest};
use crate::extract::{ExtractionError, extract_article};
use crate::fetch::FetchClient;
use crate::mirror::{MirrorError, MirrorResolver};
use crate::normalize::normalize;

/// Default number of articles built concurrently.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Errors that can fail one article's build.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Neither mirror could serve the article page.
    #[error(transparent)]
    Mirror(#[from] MirrorError),

    /// No recognizable article content in the fetched page.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The bundle could not be persisted.
    #[error(transparent)]
    Bundle(#[from] BundleError),
}

impl BuildError {
    /// Pipeline stage that failed, for batch-level logging.
    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Mirror(_) => "mirror-fetch",
            Self::Extraction(_) => "extraction",
            Self::Bundle(_) => "bundle-write",
        }
    }
}

/// Options controlling a batch run.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Rebuild articles whose bundle already exists.
    pub force: bool,
    /// Also run the best-effort fixed-layout (PDF) side pipeline.
    pub pdf: bool,
    /// Maximum articles built concurrently.
    pub concurrency: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            force: false,
            pdf: false,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Outcome of one article's build.
#[derive(Debug)]
pub enum BuildOutcome {
    /// Bundle already existed and `force` was not set.
    Skipped,
    /// Bundle written.
    Built {
        /// Path of the persisted bundle.
        bundle_path: PathBuf,
        /// Per-asset fetch outcomes.
        assets: AssetReport,
    },
}

/// Counters for a batch run.
///
/// Atomic so concurrent article tasks can update them without locking.
#[derive(Debug, Default)]
pub struct BuildStats {
    built: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    pdf_failed: AtomicUsize,
}

impl BuildStats {
    /// Articles whose bundle was written this run.
    #[must_use]
    pub fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }

    /// Articles skipped because their bundle already existed.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Articles whose build failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Articles whose fixed-layout compile failed (never fails the build).
    #[must_use]
    pub fn pdf_failed(&self) -> usize {
        self.pdf_failed.load(Ordering::SeqCst)
    }

    /// Total articles processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.built() + self.skipped() + self.failed()
    }

    fn increment_built(&self) {
        self.built.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_pdf_failed(&self) {
        self.pdf_failed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Runs the build pipeline over every enabled manifest record.
pub struct BatchBuilder {
    resolver: Arc<MirrorResolver>,
    client: FetchClient,
    options: BuildOptions,
}

impl BatchBuilder {
    /// Creates a batch builder.
    #[must_use]
    pub fn new(resolver: MirrorResolver, client: FetchClient, options: BuildOptions) -> Self {
        Self {
            resolver: Arc::new(resolver),
            client,
            options,
        }
    }

    /// Builds every enabled article, one bounded-concurrency task each.
    ///
    /// Failures are logged and counted; the batch always runs to completion.
    #[instrument(skip(self, manifest), fields(force = self.options.force))]
    pub async fn run(&self, manifest: &Manifest) -> Arc<BuildStats> {
        let stats = Arc::new(BuildStats::default());
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut handles = Vec::new();

        for record in manifest.enabled_articles().cloned() {
            let resolver = Arc::clone(&self.resolver);
            let client = self.client.clone();
            let stats = Arc::clone(&stats);
            let semaphore = Arc::clone(&semaphore);
            let options = self.options.clone();

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return;
                };
                process_article(&resolver, &client, &record, &options, &stats).await;
            }));
        }

        for handle in handles {
            if let Err(join_error) = handle.await {
                error!(error = %join_error, "article build task panicked");
                stats.increment_failed();
            }
        }

        info!(
            built = stats.built(),
            skipped = stats.skipped(),
            failed = stats.failed(),
            "batch build complete"
        );
        stats
    }
}

/// Builds one article and updates the batch counters.
async fn process_article(
    resolver: &MirrorResolver,
    client: &FetchClient,
    record: &ArticleRecord,
    options: &BuildOptions,
    stats: &BuildStats,
) {
    match build_article(resolver, client, record, options.force).await {
        Ok(BuildOutcome::Skipped) => {
            info!(article_id = %record.id, "bundle exists, skipping");
            stats.increment_skipped();
        }
        Ok(BuildOutcome::Built { bundle_path, assets }) => {
            info!(
                article_id = %record.id,
                bundle = %bundle_path.display(),
                assets_fetched = assets.fetched.len(),
                assets_failed = assets.failed.len(),
                "article built"
            );
            stats.increment_built();
        }
        Err(build_error) => {
            error!(
                article_id = %record.id,
                stage = build_error.stage(),
                error = %build_error,
                "article build failed"
            );
            stats.increment_failed();
            return;
        }
    }

    // Articles without a source directory simply have no PDF to produce.
    if options.pdf
        && record.latex_dir.is_some()
        && let Err(pdf_error) = pdf::compile_fixed_layout(record).await
    {
        warn!(
            article_id = %record.id,
            error = %pdf_error,
            "fixed-layout compile failed"
        );
        stats.increment_pdf_failed();
    }
}

/// Builds one article: fetch, extract, localize assets, normalize, persist.
///
/// # Errors
///
/// Returns [`BuildError`] tagged with the stage that failed. Per-asset
/// failures are not errors; they degrade to broken local references.
#[instrument(skip(resolver, client), fields(article_id = %record.id))]
pub async fn build_article(
    resolver: &MirrorResolver,
    client: &FetchClient,
    record: &ArticleRecord,
    force: bool,
) -> Result<BuildOutcome, BuildError> {
    if !force && ArticleBundle::exists_in(&record.output_dir) {
        return Ok(BuildOutcome::Skipped);
    }

    let raw = resolver.fetch_article(&record.id).await?;
    let extracted = extract_article(&raw.markup)?;

    let asset_dir = record.output_dir.join("assets");
    let (localized_body, assets) = localize_assets(
        client,
        &raw.convention,
        &record.id,
        &extracted.body,
        &asset_dir,
    )
    .await;

    let body = normalize(&localized_body);

    let bundle = ArticleBundle::new(&record.id, raw.mirror_used, body, extracted.stylesheet);
    let bundle_path = bundle.write(&record.output_dir).await?;

    Ok(BuildOutcome::Built { bundle_path, assets })
}
