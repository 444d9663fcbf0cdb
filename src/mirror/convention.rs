//! Asset-reference conventions per mirror.
//!
//! The two mirrors format image references differently: the primary embeds a
//! path-qualified form (`src="/html/<id>/assets/<file>"`) while the secondary
//! uses bare relative filenames (`src="figs/plot.png"`). Each variant carries
//! its own scan pattern and remote-URL construction so downstream code never
//! has to guess which style a document follows.

use std::sync::LazyLock;

use regex::{Captures, Regex};

#[allow(clippy::expect_used)]
static PATH_QUALIFIED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"src="/html/(\d{4}\.\d{4,5}(?:v\d+)?)/assets/([^"]+)""#)
        .expect("path-qualified asset regex is valid")
});

// First path segment must not be ".", "/", or a scheme, so rewritten
// "./assets/..." refs and absolute URLs never re-match.
#[allow(clippy::expect_used)]
static BARE_FILENAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"src="((?:[\w\-]+/)*[\w\-.%]+\.(?:png|jpe?g|gif|svg|webp))""#)
        .expect("bare-filename asset regex is valid")
});

/// Asset-reference convention of the mirror that served a document.
///
/// Selected once at resolution time and passed explicitly to the asset
/// resolver; never re-derived from markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorConvention {
    /// `src="/html/<id>/assets/<file>"`; assets fetched from
    /// `<asset_base>/html/<id>/assets/<file>`.
    PathQualified {
        /// Host prefix the path-qualified refs resolve against.
        asset_base: String,
    },
    /// `src="<relative-file>"`; assets fetched relative to the article
    /// page directory `<page_base>/<id>/`.
    BareFilename {
        /// Prefix of the article page directory, without the article id.
        page_base: String,
    },
}

impl MirrorConvention {
    /// Creates the path-qualified convention for the given mirror host.
    #[must_use]
    pub fn path_qualified(asset_base: impl Into<String>) -> Self {
        Self::PathQualified {
            asset_base: asset_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Creates the bare-filename convention for the given page directory base.
    #[must_use]
    pub fn bare_filename(page_base: impl Into<String>) -> Self {
        Self::BareFilename {
            page_base: page_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Short name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PathQualified { .. } => "path-qualified",
            Self::BareFilename { .. } => "bare-filename",
        }
    }

    /// Scans body markup for image references, returning filenames in
    /// document order (duplicates included; the caller deduplicates).
    ///
    /// The filename keeps any nested subdirectory implied by the reference
    /// (e.g. `figs/plot.png`).
    #[must_use]
    pub fn scan_assets(&self, body: &str) -> Vec<String> {
        let (pattern, group) = self.pattern_and_group();
        pattern
            .captures_iter(body)
            .filter_map(|caps| caps.get(group).map(|m| m.as_str().to_string()))
            .collect()
    }

    /// Builds the remote URL an asset must be fetched from.
    #[must_use]
    pub fn remote_url(&self, article_id: &str, filename: &str) -> String {
        match self {
            Self::PathQualified { asset_base } => {
                format!("{asset_base}/html/{article_id}/assets/{filename}")
            }
            Self::BareFilename { page_base } => {
                format!("{page_base}/{article_id}/{filename}")
            }
        }
    }

    /// Rewrites every matching reference to the local relative form
    /// `./assets/<filename>`.
    ///
    /// All matches are rewritten, including assets whose fetch failed; a
    /// broken local reference defers the failure to render time instead of
    /// aborting the build.
    #[must_use]
    pub fn rewrite_refs(&self, body: &str) -> String {
        let (pattern, group) = self.pattern_and_group();
        pattern
            .replace_all(body, |caps: &Captures<'_>| {
                let filename = caps.get(group).map_or("", |m| m.as_str());
                format!(r#"src="./assets/{filename}""#)
            })
            .into_owned()
    }

    fn pattern_and_group(&self) -> (&'static Regex, usize) {
        match self {
            Self::PathQualified { .. } => (&PATH_QUALIFIED_RE, 2),
            Self::BareFilename { .. } => (&BARE_FILENAME_RE, 1),
        }
    }
}
