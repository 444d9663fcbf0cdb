//! Display-time enhancement of a stored article bundle.
//!
//! A [`ReaderSession`] belongs to exactly one article view. It loads the
//! bundle once on first reveal (retrying on later reveals only if that load
//! failed), runs the enhancement pipeline (bibliography index,
//! citation rewrite, table of contents), and owns the view-local state the
//! host needs: visibility, scroll tracking, the open hover card. Nothing in
//! this module touches global state, so several sessions can coexist on one
//! page without interfering.

pub mod bib;
pub mod cite;
pub mod toc;

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::bundle::{ArticleBundle, BundleError};
use crate::fetch::{FetchClient, FetchError};

use bib::BibIndex;
use cite::{AnchorRect, Tooltip};
use toc::{NavLists, ScrollSpy, DEFAULT_TOP_OFFSET};

/// Inline notice shown in place of the article when the bundle cannot be
/// loaded.
pub const LOAD_FAILURE_NOTICE: &str =
    "The full text could not be loaded. Please use the PDF link instead.";

#[allow(clippy::expect_used)]
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag-stripping regex is valid"));

/// Removes markup tags, leaving visible text.
pub(crate) fn strip_tags(markup: &str) -> String {
    TAG_RE.replace_all(markup, "").into_owned()
}

/// Errors from loading a bundle for display.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Bundle(#[from] BundleError),
}

/// A fully enhanced article ready for display.
#[derive(Debug)]
pub struct ReaderView {
    pub body: String,
    pub stylesheet: String,
    pub nav: NavLists,
    pub bib: BibIndex,
    pub spy: ScrollSpy,
}

#[derive(Debug)]
enum LoadState {
    NotLoaded,
    Loaded(ReaderView),
    Failed(String),
}

/// Per-view reader state.
#[derive(Debug)]
pub struct ReaderSession {
    client: FetchClient,
    bundle_url: String,
    viewport_height: f64,
    state: LoadState,
    visible: bool,
    tooltip: Option<Tooltip>,
}

impl ReaderSession {
    #[must_use]
    pub fn new(client: FetchClient, bundle_url: impl Into<String>, viewport_height: f64) -> Self {
        Self {
            client,
            bundle_url: bundle_url.into(),
            viewport_height,
            state: LoadState::NotLoaded,
            visible: false,
            tooltip: None,
        }
    }

    /// Flips visibility. The first reveal loads and enhances the bundle; a
    /// failed load degrades to an inline notice instead of an empty view and
    /// is attempted again on the next reveal. A successful load is kept for
    /// the life of the session. Hiding always closes any open hover card.
    #[instrument(skip(self), fields(url = %self.bundle_url))]
    pub async fn toggle(&mut self) -> bool {
        if self.visible {
            self.visible = false;
            self.tooltip = None;
            return false;
        }

        if !matches!(self.state, LoadState::Loaded(_)) {
            match self.load_and_enhance().await {
                Ok(view) => {
                    info!(sections = view.nav.primary.len(), bib_entries = view.bib.len(),
                        "article enhanced");
                    self.state = LoadState::Loaded(view);
                }
                Err(err) => {
                    warn!(error = %err, "bundle load failed, degrading to notice");
                    self.state = LoadState::Failed(LOAD_FAILURE_NOTICE.to_string());
                }
            }
        }

        self.visible = true;
        true
    }

    async fn load_and_enhance(&self) -> Result<ReaderView, ReaderError> {
        let json = self.client.fetch_text(&self.bundle_url).await?;
        let bundle = ArticleBundle::from_json(&json)?;
        Ok(enhance(&bundle, self.viewport_height))
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// The enhanced view, once loaded successfully.
    #[must_use]
    pub fn view(&self) -> Option<&ReaderView> {
        match &self.state {
            LoadState::Loaded(view) => Some(view),
            _ => None,
        }
    }

    #[must_use]
    pub fn view_mut(&mut self) -> Option<&mut ReaderView> {
        match &mut self.state {
            LoadState::Loaded(view) => Some(view),
            _ => None,
        }
    }

    /// The degraded-mode notice, when the load failed.
    #[must_use]
    pub fn failure_notice(&self) -> Option<&str> {
        match &self.state {
            LoadState::Failed(notice) => Some(notice),
            _ => None,
        }
    }

    /// Opens the hover card for a bibliography entry. Any previous card is
    /// replaced, never stacked.
    pub fn open_tooltip(
        &mut self,
        entry_id: &str,
        anchor: AnchorRect,
        card_height: f64,
    ) -> Option<&Tooltip> {
        let entry = self.view()?.bib.get(entry_id)?.clone();
        self.tooltip = Some(Tooltip::for_entry(
            &entry,
            anchor,
            card_height,
            self.viewport_height,
        ));
        self.tooltip.as_ref()
    }

    pub fn close_tooltip(&mut self) {
        self.tooltip = None;
    }

    #[must_use]
    pub fn tooltip(&self) -> Option<&Tooltip> {
        self.tooltip.as_ref()
    }
}

/// Runs the enhancement pipeline over a loaded bundle.
///
/// Order matters: the bibliography index must exist before citations are
/// rewritten, and the table of contents is built from the final markup.
#[must_use]
pub fn enhance(bundle: &ArticleBundle, viewport_height: f64) -> ReaderView {
    let (body, bib) = bib::index_bibliography(&bundle.body_markup);
    let body = cite::rewrite_citations(&body, &bib);
    let (body, nav) = toc::build_toc(&body);

    ReaderView {
        body,
        stylesheet: bundle.stylesheet_text.clone(),
        nav,
        bib,
        spy: ScrollSpy::new(DEFAULT_TOP_OFFSET, viewport_height),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mirror::MirrorKind;

    fn sample_bundle() -> ArticleBundle {
        let body = concat!(
            r#"<h2 class="ltx_title ltx_title_section">1 Introduction</h2>"#,
            r##"<p>See <cite class="ltx_cite">[<a href="#bib.bib1">1</a>]</cite>.</p>"##,
            r#"<ul class="ltx_biblist">"#,
            r#"<li class="ltx_bibitem" id="bib.bib1">"#,
            r#"<span class="ltx_tag ltx_tag_bibitem">[1]</span>"#,
            r#"<span class="ltx_bibblock">Smith, J. (2020). A Method.</span>"#,
            r#"</li></ul>"#,
        );
        ArticleBundle::new("2101.00001", MirrorKind::Primary, body, ".ltx_document{margin:0}")
    }

    #[test]
    fn test_enhance_runs_full_pipeline() {
        let view = enhance(&sample_bundle(), 800.0);

        assert!(view.body.contains("(Smith, <a"));
        assert!(view.body.contains(r#"<h2 id="section-1""#));
        assert_eq!(view.nav.primary.len(), 1);
        assert_eq!(view.bib.len(), 1);
        assert_eq!(view.stylesheet, ".ltx_document{margin:0}");
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<a href=\"#x\">12</a>, <b>14</b>"), "12, 14");
        assert_eq!(strip_tags("plain"), "plain");
    }

    #[tokio::test]
    async fn test_session_toggle_without_server_degrades() {
        let client = FetchClient::new(crate::fetch::FetchPolicy::with_retries(0));
        let mut session = ReaderSession::new(client, "http://127.0.0.1:1/bundle.json", 800.0);

        assert!(session.toggle().await);
        assert!(session.is_visible());
        assert!(session.view().is_none());
        assert_eq!(session.failure_notice(), Some(LOAD_FAILURE_NOTICE));

        // Re-showing retries the load; against a dead port it fails again.
        assert!(!session.toggle().await);
        assert!(session.toggle().await);
        assert_eq!(session.failure_notice(), Some(LOAD_FAILURE_NOTICE));
    }

    #[test]
    fn test_tooltip_lifecycle_replaces_and_closes() {
        let client = FetchClient::default();
        let mut session = ReaderSession::new(client, "unused", 800.0);
        session.state = LoadState::Loaded(enhance(&sample_bundle(), 800.0));

        let anchor = AnchorRect { top: 40.0, bottom: 60.0 };
        assert!(session.open_tooltip("bib.bib1", anchor, 90.0).is_some());
        assert!(session.tooltip().is_some());

        // Unknown entry leaves the previous card in place.
        assert!(session.open_tooltip("bib.bib99", anchor, 90.0).is_none());
        assert!(session.tooltip().is_some());

        session.close_tooltip();
        assert!(session.tooltip().is_none());
    }
}
