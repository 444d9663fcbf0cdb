//! Citation span rewriting and hover tooltip placement.
//!
//! Inline citation spans come in two kinds. Spans whose visible text already
//! reads as author-year prose are classified up front and left textually
//! untouched. Numeric spans are rewritten to author-year form, but only
//! all-or-nothing: if any referenced id is missing from the index or carries
//! no data, the whole span keeps its original text. Links in both kinds of
//! span gain `data-bib-*` attributes so the host can show a hover card
//! without a second index lookup.
//!
//! The author-year classification is a surface-text heuristic ("Surname et
//! al.", "Surname and Surname"). It misreads citations whose first word is
//! not a capitalized surname; that trade-off is accepted rather than
//! hardened.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, instrument, warn};

use super::bib::{BibEntry, BibIndex};
use super::strip_tags;

#[allow(clippy::expect_used)]
static CITE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<cite([^>]*)>(.*?)</cite>").expect("citation span regex is valid")
});

#[allow(clippy::expect_used)]
static CITE_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<a([^>]*)>(.*?)</a>").expect("citation link regex is valid")
});

#[allow(clippy::expect_used)]
static HREF_ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r##"href="#([^"]+)""##).expect("href anchor regex is valid"));

#[allow(clippy::expect_used)]
static AUTHOR_YEAR_TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z][\w'’-]*\s+(?:et\s+al\.?|(?:and|&)\s+[A-Z][\w'’-]*)")
        .expect("author-year text regex is valid")
});

/// How a citation span read before any mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitationKind {
    /// Visible text already reads as author-year prose.
    AlreadyAuthorYear,
    /// Every link's visible text is a bare number.
    Numeric,
    /// Anything else; left alone apart from link decoration.
    Other,
}

/// Classifies a citation span from its visible text and link texts.
#[must_use]
pub fn classify_citation(visible_text: &str, link_texts: &[String]) -> CitationKind {
    if AUTHOR_YEAR_TEXT_RE.is_match(visible_text.trim()) {
        return CitationKind::AlreadyAuthorYear;
    }
    if !link_texts.is_empty() && link_texts.iter().all(|text| is_reference_number(text)) {
        return CitationKind::Numeric;
    }
    CitationKind::Other
}

/// True for link text reading as a bare reference number. A four-digit
/// value in the publication-year range is a linked year, not a reference
/// number, so spans like `Smith (2020)` never classify as numeric even
/// when the author half falls outside the author-year prose pattern.
fn is_reference_number(text: &str) -> bool {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    !(text.len() == 4 && text.parse::<u16>().is_ok_and(|n| (1500..=2199).contains(&n)))
}

/// Rewrites every citation span in the body against the bibliography index.
///
/// Classification happens before any mutation, so a span is never judged by
/// text this pass itself produced.
#[instrument(skip(body, index), fields(body_len = body.len()))]
#[must_use]
pub fn rewrite_citations(body: &str, index: &BibIndex) -> String {
    let mut rewritten_spans = 0usize;
    let mut abandoned_spans = 0usize;

    let out = CITE_RE
        .replace_all(body, |caps: &Captures<'_>| {
            let attrs = caps.get(1).map_or("", |m| m.as_str());
            let inner = caps.get(2).map_or("", |m| m.as_str());

            let links = collect_links(inner);
            let visible = strip_tags(inner);
            let link_texts: Vec<String> = links.iter().map(|link| link.text.clone()).collect();

            match classify_citation(&visible, &link_texts) {
                CitationKind::Numeric => match rewrite_numeric_span(&links, index) {
                    Some(new_inner) => {
                        rewritten_spans += 1;
                        format!("<cite{attrs}>{new_inner}</cite>")
                    }
                    None => {
                        abandoned_spans += 1;
                        warn!(span = %visible.trim(), "citation span left unrewritten, unresolved reference");
                        format!("<cite{attrs}>{}</cite>", decorate_links(inner, index))
                    }
                },
                CitationKind::AlreadyAuthorYear | CitationKind::Other => {
                    format!("<cite{attrs}>{}</cite>", decorate_links(inner, index))
                }
            }
        })
        .into_owned();

    debug!(rewritten_spans, abandoned_spans, "citation rewrite complete");
    out
}

struct CiteLink {
    attrs: String,
    text: String,
    target: Option<String>,
}

fn collect_links(span_inner: &str) -> Vec<CiteLink> {
    CITE_LINK_RE
        .captures_iter(span_inner)
        .map(|caps| {
            let attrs = caps.get(1).map_or("", |m| m.as_str()).to_string();
            let text = strip_tags(caps.get(2).map_or("", |m| m.as_str()))
                .trim()
                .to_string();
            let target = HREF_ANCHOR_RE
                .captures(&attrs)
                .and_then(|href| href.get(1))
                .map(|m| m.as_str().to_string());
            CiteLink { attrs, text, target }
        })
        .collect()
}

/// Rebuilds a numeric span as `(Author, Year; Author, Year)` with each year
/// kept as a link. Returns `None` when any reference fails to resolve.
fn rewrite_numeric_span(links: &[CiteLink], index: &BibIndex) -> Option<String> {
    if links.is_empty() {
        return None;
    }

    let mut parts = Vec::with_capacity(links.len());
    for link in links {
        let target = link.target.as_deref()?;
        let entry = index.get(target)?;
        if !entry.has_data() {
            return None;
        }
        let attrs = with_bib_attributes(&link.attrs, entry);
        parts.push(format!("{}, <a{attrs}>{}</a>", entry.authors, entry.year));
    }

    Some(format!("({})", parts.join("; ")))
}

/// Adds `data-bib-*` attributes to every resolvable link in a span without
/// touching its text.
fn decorate_links(span_inner: &str, index: &BibIndex) -> String {
    CITE_LINK_RE
        .replace_all(span_inner, |caps: &Captures<'_>| {
            let attrs = caps.get(1).map_or("", |m| m.as_str());
            let text = caps.get(2).map_or("", |m| m.as_str());
            let entry = HREF_ANCHOR_RE
                .captures(attrs)
                .and_then(|href| href.get(1))
                .and_then(|m| index.get(m.as_str()))
                .filter(|entry| entry.has_data() && !attrs.contains("data-bib-"));
            match entry {
                Some(entry) => {
                    format!("<a{}>{text}</a>", with_bib_attributes(attrs, entry))
                }
                None => format!("<a{attrs}>{text}</a>"),
            }
        })
        .into_owned()
}

fn with_bib_attributes(attrs: &str, entry: &BibEntry) -> String {
    format!(
        r#"{attrs} data-bib-authors="{}" data-bib-year="{}" data-bib-title="{}""#,
        attr_escape(&entry.authors),
        attr_escape(&entry.year),
        attr_escape(&entry.title),
    )
}

fn attr_escape(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

/// Vertical side a hover card is placed on, relative to its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TooltipSide {
    Above,
    Below,
}

/// Anchor geometry in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorRect {
    pub top: f64,
    pub bottom: f64,
}

/// Picks the side that keeps the card inside the viewport, preferring
/// below and flipping above when the card would run off the bottom.
#[must_use]
pub fn place_tooltip(anchor: AnchorRect, card_height: f64, viewport_height: f64) -> TooltipSide {
    if anchor.bottom + card_height <= viewport_height {
        TooltipSide::Below
    } else if anchor.top - card_height >= 0.0 {
        TooltipSide::Above
    } else {
        TooltipSide::Below
    }
}

/// A hover card for one bibliography entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip {
    pub entry_id: String,
    pub heading: String,
    pub title: String,
    pub side: TooltipSide,
}

impl Tooltip {
    /// Builds the card for an entry at the given anchor.
    #[must_use]
    pub fn for_entry(
        entry: &BibEntry,
        anchor: AnchorRect,
        card_height: f64,
        viewport_height: f64,
    ) -> Self {
        Self {
            entry_id: entry.id.clone(),
            heading: entry.display(),
            title: entry.title.clone(),
            side: place_tooltip(anchor, card_height, viewport_height),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::bib::index_bibliography;
    use super::*;

    fn sample_index() -> BibIndex {
        let body = concat!(
            r#"<li class="ltx_bibitem" id="bib.bib12"><span class="ltx_tag ltx_tag_bibitem">[12]</span>"#,
            r#"<span class="ltx_bibblock">Smith, J. (2020). A Method.</span></li>"#,
            r#"<li class="ltx_bibitem" id="bib.bib14"><span class="ltx_tag ltx_tag_bibitem">[14]</span>"#,
            r#"<span class="ltx_bibblock">Lee, K. (2021).</span><span class="ltx_bibblock">Another Method.</span></li>"#,
            r#"<li class="ltx_bibitem" id="bib.bib20"><span class="ltx_tag ltx_tag_bibitem">ISO 9899</span>"#,
            r#"<span class="ltx_bibblock">The C Standard.</span></li>"#,
        );
        index_bibliography(body).1
    }

    #[test]
    fn test_classify_author_year_prose() {
        assert_eq!(
            classify_citation("Smith et al. (2020)", &[]),
            CitationKind::AlreadyAuthorYear
        );
        assert_eq!(
            classify_citation("Jones and Lee, 2019", &[]),
            CitationKind::AlreadyAuthorYear
        );
        assert_eq!(
            classify_citation("Kim & Park 2018", &[]),
            CitationKind::AlreadyAuthorYear
        );
    }

    #[test]
    fn test_classify_numeric() {
        assert_eq!(
            classify_citation("[12, 14]", &["12".to_string(), "14".to_string()]),
            CitationKind::Numeric
        );
    }

    #[test]
    fn test_classify_other() {
        assert_eq!(
            classify_citation("[ibid.]", &["ibid.".to_string()]),
            CitationKind::Other
        );
        assert_eq!(classify_citation("", &[]), CitationKind::Other);
    }

    #[test]
    fn test_classify_year_only_link_is_not_numeric() {
        // A single-author span links just the year; it must not be treated
        // as a bare reference number.
        assert_eq!(
            classify_citation("Smith (2020)", &["2020".to_string()]),
            CitationKind::Other
        );
        // Out-of-range four-digit values are still reference numbers.
        assert_eq!(
            classify_citation("[4021]", &["4021".to_string()]),
            CitationKind::Numeric
        );
    }

    #[test]
    fn test_rewrite_is_idempotent_for_single_author_span() {
        let index = sample_index();
        let body = r##"<cite class="ltx_cite">[<a href="#bib.bib12">12</a>]</cite>"##;

        let once = rewrite_citations(body, &index);
        assert!(once.contains("(Smith, <a"));

        let twice = rewrite_citations(&once, &index);
        assert_eq!(twice, once);
    }

    #[test]
    fn test_numeric_span_rewritten_to_author_year() {
        let index = sample_index();
        let body = r##"<p>As shown in <cite class="ltx_cite">[<a href="#bib.bib12">12</a>]</cite>.</p>"##;
        let out = rewrite_citations(body, &index);

        assert!(out.contains("(Smith, <a"));
        assert!(out.contains(">2020</a>)"));
        assert!(out.contains(r#"data-bib-authors="Smith""#));
        assert!(out.contains(r#"data-bib-year="2020""#));
        assert!(out.contains(r#"data-bib-title="A Method.""#));
        assert!(!out.contains(">12</a>"));
    }

    #[test]
    fn test_multi_reference_span_joined_with_semicolons() {
        let index = sample_index();
        let body = r##"<cite class="ltx_cite">[<a href="#bib.bib12">12</a>, <a href="#bib.bib14">14</a>]</cite>"##;
        let out = rewrite_citations(body, &index);

        let smith = out.find("Smith,").unwrap();
        let lee = out.find("Lee,").unwrap();
        assert!(smith < lee);
        assert!(out.contains("; Lee,"));
        assert!(out.starts_with(r#"<cite class="ltx_cite">("#));
    }

    #[test]
    fn test_unresolved_reference_abandons_whole_span() {
        let index = sample_index();
        let body = r##"<cite class="ltx_cite">[<a href="#bib.bib12">12</a>, <a href="#bib.bib99">99</a>]</cite>"##;
        let out = rewrite_citations(body, &index);

        // Text untouched, but the resolvable link still gains hover data.
        assert!(out.contains(">12</a>"));
        assert!(out.contains(">99</a>"));
        assert!(out.contains(r#"data-bib-authors="Smith""#));
    }

    #[test]
    fn test_no_data_entry_abandons_whole_span() {
        let index = sample_index();
        let body = r##"<cite class="ltx_cite">[<a href="#bib.bib20">20</a>]</cite>"##;
        let out = rewrite_citations(body, &index);
        assert!(out.contains(">20</a>"));
    }

    #[test]
    fn test_author_year_span_text_unchanged_but_links_decorated() {
        let index = sample_index();
        let body = r##"<cite class="ltx_cite">Smith et al. (<a href="#bib.bib12">2020</a>)</cite>"##;
        let out = rewrite_citations(body, &index);

        assert!(out.contains("Smith et al. (<a"));
        assert!(out.contains(">2020</a>)"));
        assert!(out.contains(r#"data-bib-title="A Method.""#));
    }

    #[test]
    fn test_attribute_values_escaped() {
        assert_eq!(attr_escape(r#"A "quoted" & thing"#), "A &quot;quoted&quot; &amp; thing");
    }

    #[test]
    fn test_tooltip_prefers_below() {
        let anchor = AnchorRect { top: 100.0, bottom: 120.0 };
        assert_eq!(place_tooltip(anchor, 80.0, 600.0), TooltipSide::Below);
    }

    #[test]
    fn test_tooltip_flips_above_near_bottom() {
        let anchor = AnchorRect { top: 560.0, bottom: 580.0 };
        assert_eq!(place_tooltip(anchor, 80.0, 600.0), TooltipSide::Above);
    }

    #[test]
    fn test_tooltip_stays_below_when_neither_side_fits() {
        let anchor = AnchorRect { top: 30.0, bottom: 50.0 };
        assert_eq!(place_tooltip(anchor, 580.0, 600.0), TooltipSide::Below);
    }

    #[test]
    fn test_tooltip_for_entry_carries_display_text() {
        let index = sample_index();
        let entry = index.get("bib.bib12").unwrap();
        let anchor = AnchorRect { top: 10.0, bottom: 30.0 };
        let card = Tooltip::for_entry(entry, anchor, 60.0, 400.0);
        assert_eq!(card.heading, "Smith (2020)");
        assert_eq!(card.title, "A Method.");
        assert_eq!(card.side, TooltipSide::Below);
    }
}
