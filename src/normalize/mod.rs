//! Ordered, idempotent text repairs for extracted article markup.
//!
//! Mirror-rendered markup carries a handful of recurring artifacts: commas
//! duplicated by the citation renderer, absolute links back into the same
//! document, author names trapped inside citation links, and unrendered
//! formatting-macro placeholders. Each repair is a pure `&str -> String`
//! pass; [`normalize`] applies them via a fold over [`PASSES`].
//!
//! The chain is order-sensitive (later passes assume earlier passes' output
//! shape) and idempotent as a whole: re-running it on already-normalized
//! markup is a no-op. No pass may panic.

use std::sync::LazyLock;

use regex::Regex;
use tracing::instrument;

/// The normalizer chain, in application order. Each entry is `(name, pass)`;
/// the name appears in trace logs and test output.
pub const PASSES: &[(&str, fn(&str) -> String)] = &[
    ("collapse-duplicate-commas", collapse_duplicate_commas),
    ("relativize-same-document-anchors", relativize_same_document_anchors),
    ("hoist-author-from-citation-link", hoist_author_from_citation_link),
    ("drop-comma-before-close-paren", drop_comma_before_close_paren),
    ("drop-comma-before-semicolon", drop_comma_before_semicolon),
    ("collapse-table-citation-commas", collapse_table_citation_commas),
    ("strip-macro-error-placeholders", strip_macro_error_placeholders),
];

/// Applies the full normalizer chain to the given markup.
#[instrument(skip(markup), fields(markup_len = markup.len()))]
#[must_use]
pub fn normalize(markup: &str) -> String {
    PASSES
        .iter()
        .fold(markup.to_string(), |text, (_, pass)| pass(&text))
}

#[allow(clippy::expect_used)]
static DUPLICATE_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(?:\s*,)+").expect("duplicate comma regex is valid"));

/// Collapses runs of comma separators left by the citation renderer
/// (`, ,` or `,,`) into a single comma.
fn collapse_duplicate_commas(text: &str) -> String {
    DUPLICATE_COMMA_RE.replace_all(text, ",").into_owned()
}

#[allow(clippy::expect_used)]
static SAME_DOC_ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"href="https?://[^"]*/html/\d{4}\.\d{4,5}(?:v\d+)?(?:/)?#([^"]+)""#)
        .expect("same-document anchor regex is valid")
});

/// Rewrites absolute links that merely target an anchor within the same
/// document into bare `#anchor` links.
fn relativize_same_document_anchors(text: &str) -> String {
    SAME_DOC_ANCHOR_RE
        .replace_all(text, r##"href="#$1""##)
        .into_owned()
}

#[allow(clippy::expect_used)]
static AUTHOR_IN_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<a([^>]*)>\s*([A-Z][^<>()]*?)\s*\((\d{4}[a-z]?)\)\s*</a>")
        .expect("author-in-link regex is valid")
});

/// Moves author-name text that was rendered inside a citation link back out,
/// so only the year remains inside the link.
///
/// `<a href="#bib.bib3">Smith et al. (2020)</a>` becomes
/// `Smith et al. (<a href="#bib.bib3">2020</a>)`. Idempotent: rewritten
/// links contain only digits, which the pattern cannot match.
fn hoist_author_from_citation_link(text: &str) -> String {
    AUTHOR_IN_LINK_RE
        .replace_all(text, "$2 (<a$1>$3</a>)")
        .into_owned()
}

#[allow(clippy::expect_used)]
static COMMA_BEFORE_PAREN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s+\)").expect("comma-before-paren regex is valid"));

/// Removes a trailing comma-space immediately before a closing parenthesis.
fn drop_comma_before_close_paren(text: &str) -> String {
    COMMA_BEFORE_PAREN_RE.replace_all(text, ")").into_owned()
}

#[allow(clippy::expect_used)]
static COMMA_BEFORE_SEMICOLON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s+;").expect("comma-before-semicolon regex is valid"));

/// Removes a comma-space before a semicolon separator.
fn drop_comma_before_semicolon(text: &str) -> String {
    COMMA_BEFORE_SEMICOLON_RE.replace_all(text, ";").into_owned()
}

#[allow(clippy::expect_used)]
static TABLE_CITATION_COMMA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(",\u{200B}*\\s*\n\\s*,").expect("table citation comma regex is valid")
});

/// Collapses the duplicated-comma artifact that table-rendered citation
/// blocks produce across cell line breaks (a comma, optional zero-width
/// space, newline, comma).
fn collapse_table_citation_commas(text: &str) -> String {
    TABLE_CITATION_COMMA_RE.replace_all(text, ",").into_owned()
}

#[allow(clippy::expect_used)]
static MACRO_ERROR_SPAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<span[^>]*class="ltx_ERROR[^"]*"[^>]*>.*?</span>"#)
        .expect("macro error span regex is valid")
});

#[allow(clippy::expect_used)]
static COLOR_LEFTOVER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\definecolor\{[^}]*\}\{[^}]*\}\{[^}]*\}|\[RGB\]\{\d+,\d+,\d+\}")
        .expect("color leftover regex is valid")
});

/// Strips unrendered formatting-macro error placeholders (`ltx_ERROR` spans)
/// and the stray color-code text they leave behind.
fn strip_macro_error_placeholders(text: &str) -> String {
    let without_spans = MACRO_ERROR_SPAN_RE.replace_all(text, "");
    COLOR_LEFTOVER_RE.replace_all(&without_spans, "").into_owned()
}
