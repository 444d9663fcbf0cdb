//! Article body extraction from full-page mirror markup.
//!
//! Isolates the article container, strips known non-content regions, and
//! trims everything before the first real section. Title, author, and
//! abstract metadata are intentionally dropped; the surrounding page
//! template renders those separately.

mod error;

pub use error::ExtractionError;

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

#[allow(clippy::expect_used)]
static ARTICLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<article[^>]*class="ltx_document[^"]*"[^>]*>(.*?)</article>"#)
        .expect("article container regex is valid")
});

#[allow(clippy::expect_used)]
static PAGE_LOGO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<div[^>]*class="ltx_page_logo"[^>]*>.*?</div>"#)
        .expect("page logo regex is valid")
});

#[allow(clippy::expect_used)]
static NAVBAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<nav[^>]*>.*?</nav>"#).expect("navbar regex is valid")
});

#[allow(clippy::expect_used)]
static FOOTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<footer[^>]*>.*?</footer>").expect("footer regex is valid"));

#[allow(clippy::expect_used)]
static FIRST_SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<section[^>]*class="ltx_section[^"]*"[^>]*>"#)
        .expect("first section regex is valid")
});

#[allow(clippy::expect_used)]
static STYLE_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<style[^>]*>(.*?)</style>").expect("style block regex is valid")
});

/// Body markup and extracted stylesheet text for one article.
#[derive(Debug, Clone)]
pub struct ExtractedArticle {
    /// Cleaned article body, starting at the first real section when one exists.
    pub body: String,
    /// Concatenated text of the page's `<style>` blocks.
    pub stylesheet: String,
}

/// Extracts the article body from full-page markup.
///
/// Steps, in order:
/// 1. Isolate the `ltx_document` article subtree.
/// 2. Remove page logos, navigation bars, and footers, tolerating absence.
/// 3. Discard everything before the first `ltx_section` marker. When no
///    marker exists the whole isolated subtree is kept; that is a deliberate
///    permissive fallback, not an error.
///
/// # Errors
///
/// Returns [`ExtractionError::NoArticleContainer`] when the page has no
/// recognizable article container.
#[instrument(skip(page_markup), fields(page_len = page_markup.len()))]
pub fn extract_article(page_markup: &str) -> Result<ExtractedArticle, ExtractionError> {
    let container = ARTICLE_RE
        .captures(page_markup)
        .and_then(|caps| caps.get(1))
        .ok_or(ExtractionError::NoArticleContainer)?
        .as_str();

    let mut body = PAGE_LOGO_RE.replace_all(container, "").into_owned();
    body = NAVBAR_RE.replace_all(&body, "").into_owned();
    body = FOOTER_RE.replace_all(&body, "").into_owned();

    if let Some(section) = FIRST_SECTION_RE.find(&body) {
        debug!(offset = section.start(), "trimming preamble before first section");
        body = body[section.start()..].to_string();
    } else {
        debug!("no section marker found, keeping full article subtree");
    }

    let stylesheet = extract_stylesheet(page_markup);

    Ok(ExtractedArticle {
        body: body.trim().to_string(),
        stylesheet,
    })
}

/// Collects the text of every `<style>` block on the page.
#[must_use]
pub fn extract_stylesheet(page_markup: &str) -> String {
    STYLE_BLOCK_RE
        .captures_iter(page_markup)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim()))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
