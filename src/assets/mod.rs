//! Asset discovery, download, and reference rewriting.
//!
//! Scans the extracted body for image references using the active mirror's
//! [`MirrorConvention`], deduplicates by filename, fetches each unique asset
//! once through the [`FetchClient`], and rewrites *all* matching references
//! to local relative paths. Individual asset failures are logged and
//! recorded, never fatal: a failed asset becomes a broken local reference,
//! deferring the visual failure to render time instead of aborting the
//! article's build.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, instrument, warn};

use crate::fetch::FetchClient;
use crate::mirror::MirrorConvention;

/// One discovered image reference.
///
/// Uniqueness is keyed by `filename` within one article; a multiply
/// referenced image is fetched at most once per build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    /// Filename as it appears in the reference, nested subdirectory included.
    pub filename: String,
    /// Remote URL the asset is fetched from.
    pub remote_url: String,
    /// Local destination under the article's asset directory.
    pub local_path: PathBuf,
}

/// Per-asset outcome record for one article's asset pass.
#[derive(Debug, Clone, Default)]
pub struct AssetReport {
    /// Filenames fetched successfully.
    pub fetched: Vec<String>,
    /// Filenames whose fetch failed (now broken local references).
    pub failed: Vec<String>,
}

impl AssetReport {
    /// Total unique assets processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.fetched.len() + self.failed.len()
    }
}

/// Discovers the unique asset references in `body` under the given
/// convention, in first-occurrence order.
#[must_use]
pub fn discover_assets(
    convention: &MirrorConvention,
    article_id: &str,
    body: &str,
    asset_dir: &Path,
) -> Vec<AssetRef> {
    let mut seen = HashSet::new();
    convention
        .scan_assets(body)
        .into_iter()
        .filter(|filename| seen.insert(filename.clone()))
        .map(|filename| {
            let remote_url = convention.remote_url(article_id, &filename);
            let decoded = urlencoding::decode(&filename)
                .map_or_else(|_| filename.clone(), |cow| cow.into_owned());
            AssetRef {
                local_path: asset_dir.join(&decoded),
                filename,
                remote_url,
            }
        })
        .collect()
}

/// Fetches every unique asset and rewrites all references to local form.
///
/// Returns the rewritten body and the per-asset report. Never fails as a
/// whole: the report records which assets degraded to broken references.
#[instrument(skip(client, convention, body), fields(article_id = %article_id, convention = convention.name()))]
pub async fn localize_assets(
    client: &FetchClient,
    convention: &MirrorConvention,
    article_id: &str,
    body: &str,
    asset_dir: &Path,
) -> (String, AssetReport) {
    let refs = discover_assets(convention, article_id, body, asset_dir);
    let mut report = AssetReport::default();

    for asset in &refs {
        if !is_safe_local_path(&asset.local_path, asset_dir) {
            warn!(filename = %asset.filename, "asset path escapes asset directory, skipping fetch");
            report.failed.push(asset.filename.clone());
            continue;
        }

        if let Some(parent) = asset.local_path.parent()
            && let Err(error) = tokio::fs::create_dir_all(parent).await
        {
            warn!(filename = %asset.filename, error = %error, "failed to create asset subdirectory");
            report.failed.push(asset.filename.clone());
            continue;
        }

        match client.fetch_to_file(&asset.remote_url, &asset.local_path).await {
            Ok(()) => {
                debug!(filename = %asset.filename, "asset downloaded");
                report.fetched.push(asset.filename.clone());
            }
            Err(error) => {
                warn!(
                    filename = %asset.filename,
                    url = %asset.remote_url,
                    error = %error,
                    "asset download failed, reference will be broken locally"
                );
                report.failed.push(asset.filename.clone());
            }
        }
    }

    // Rewrite every matching reference, failed fetches included.
    let rewritten = convention.rewrite_refs(body);
    (rewritten, report)
}

/// True when `path` stays within `root` after normalization.
fn is_safe_local_path(path: &Path, root: &Path) -> bool {
    if path
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        return false;
    }
    path.starts_with(root)
}
