//! Bibliography indexing over a loaded bundle body.
//!
//! Parses each rendered bibliography item into a [`BibEntry`] keyed by the
//! item's anchor id, rewriting item labels in place so later passes see a
//! consistent author-year form. The index is built fresh on every load and
//! never persisted.
//!
//! Label shapes handled, in order:
//! - purely numeric (`[12]`, `(3)`): authors/year parsed out of the item's
//!   first free-text block via a `Name (Year)` pattern, trailing initials
//!   trimmed from the surname, an "et al." suffix preserved; the label is
//!   rewritten to the derived author-year form
//! - recognized author-year shapes (bracketed year, comma-parenthesized
//!   year, bare-parenthesized year): read directly, label normalized to a
//!   single canonical `(year)` punctuation style
//! - anything else: a "no data" entry with empty authors/year and a
//!   fallback display string equal to the original label; downstream
//!   rewriting must skip such entries rather than guess

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, instrument};

use super::strip_tags;

#[allow(clippy::expect_used)]
static BIBITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<li([^>]*)>(.*?)</li>").expect("bibliography item regex is valid")
});

#[allow(clippy::expect_used)]
static ID_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"id="([^"]+)""#).expect("id attribute regex is valid"));

#[allow(clippy::expect_used)]
static LABEL_SPAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<span([^>]*class="ltx_tag[^"]*"[^>]*)>(.*?)</span>"#)
        .expect("label span regex is valid")
});

#[allow(clippy::expect_used)]
static BIBBLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<span[^>]*class="ltx_bibblock[^"]*"[^>]*>(.*?)</span>"#)
        .expect("bibblock regex is valid")
});

#[allow(clippy::expect_used)]
static NUMERIC_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[\[(]?\s*\d{1,3}\s*[\])]?\s*$").expect("numeric label regex is valid")
});

#[allow(clippy::expect_used)]
static BRACKETED_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\[(.+?)[\s,]+\(?(\d{4}[a-z]?)\)?\]\s*$")
        .expect("bracketed label regex is valid")
});

#[allow(clippy::expect_used)]
static COMMA_PAREN_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(.+?),\s*\(\s*(\d{4}[a-z]?)\s*\)\s*$")
        .expect("comma-parenthesized label regex is valid")
});

#[allow(clippy::expect_used)]
static BARE_PAREN_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(.+?)\s*\(\s*(\d{4}[a-z]?)\s*\)\s*$")
        .expect("bare-parenthesized label regex is valid")
});

#[allow(clippy::expect_used)]
static FIRST_BLOCK_AUTHOR_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(.+?)\s*\(\s*(\d{4}[a-z]?)\s*\)\s*\.?\s*(.*)$")
        .expect("first block author-year regex is valid")
});

#[allow(clippy::expect_used)]
static TRAILING_INITIALS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:,\s*(?:[A-Z]\.\s*)+)+$").expect("trailing initials regex is valid")
});

/// One structured bibliography entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibEntry {
    /// The bibliography item's anchor id.
    pub id: String,
    /// Author display text ("Smith", "Smith et al."); empty when unknown.
    pub authors: String,
    /// Publication year; empty when unknown.
    pub year: String,
    /// Title text; empty when unavailable.
    pub title: String,
    /// Original label text, kept for items whose shape matched nothing.
    pub fallback_label: Option<String>,
}

impl BibEntry {
    /// True when the entry carries usable author-year data.
    ///
    /// Entries without data must be treated as "no data" by the citation
    /// rewriter, never guessed at.
    #[must_use]
    pub fn has_data(&self) -> bool {
        !self.authors.is_empty() && !self.year.is_empty()
    }

    /// Display text: `Authors (Year)`, or the fallback label when no data.
    #[must_use]
    pub fn display(&self) -> String {
        if self.has_data() {
            format!("{} ({})", self.authors, self.year)
        } else {
            self.fallback_label.clone().unwrap_or_default()
        }
    }
}

/// Lookup table from bibliography anchor id to entry.
#[derive(Debug, Clone, Default)]
pub struct BibIndex {
    entries: HashMap<String, BibEntry>,
}

impl BibIndex {
    /// Looks up an entry by anchor id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&BibEntry> {
        self.entries.get(id)
    }

    /// Number of indexed items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the body had no bibliography.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, entry: BibEntry) {
        self.entries.insert(entry.id.clone(), entry);
    }
}

/// Indexes the bibliography and rewrites item labels in place.
///
/// Returns the body with normalized labels plus the lookup table.
#[instrument(skip(body), fields(body_len = body.len()))]
#[must_use]
pub fn index_bibliography(body: &str) -> (String, BibIndex) {
    let mut index = BibIndex::default();

    let rewritten = BIBITEM_RE
        .replace_all(body, |caps: &Captures<'_>| {
            let attrs = caps.get(1).map_or("", |m| m.as_str());
            let inner = caps.get(2).map_or("", |m| m.as_str());

            if !attrs.contains("ltx_bibitem") {
                return caps.get(0).map_or(String::new(), |m| m.as_str().to_string());
            }
            let Some(id) = ID_ATTR_RE
                .captures(attrs)
                .and_then(|id_caps| id_caps.get(1))
                .map(|m| m.as_str().to_string())
            else {
                return caps.get(0).map_or(String::new(), |m| m.as_str().to_string());
            };

            let (entry, new_inner) = index_item(&id, inner);
            index.insert(entry);
            format!("<li{attrs}>{new_inner}</li>")
        })
        .into_owned();

    debug!(entries = index.len(), "bibliography indexed");
    (rewritten, index)
}

/// Parses one bibliography item, returning its entry and the item markup
/// with the label span rewritten.
fn index_item(id: &str, item_inner: &str) -> (BibEntry, String) {
    let label_text = LABEL_SPAN_RE
        .captures(item_inner)
        .and_then(|caps| caps.get(2))
        .map(|m| strip_tags(m.as_str()).trim().to_string())
        .unwrap_or_default();

    let blocks: Vec<String> = BIBBLOCK_RE
        .captures_iter(item_inner)
        .filter_map(|caps| caps.get(1))
        .map(|m| strip_tags(m.as_str()).trim().to_string())
        .collect();

    let entry = classify_label(id, &label_text, &blocks);

    let new_inner = if entry.has_data() {
        let new_label = entry.display();
        LABEL_SPAN_RE
            .replace(item_inner, |caps: &Captures<'_>| {
                let attrs = caps.get(1).map_or("", |m| m.as_str());
                format!("<span{attrs}>{new_label}</span>")
            })
            .into_owned()
    } else {
        item_inner.to_string()
    };

    (entry, new_inner)
}

/// Builds the entry for one item from its label text and free-text blocks.
fn classify_label(id: &str, label: &str, blocks: &[String]) -> BibEntry {
    let title = blocks.get(1).cloned().unwrap_or_default();

    if NUMERIC_LABEL_RE.is_match(label) {
        return entry_from_first_block(id, label, blocks, title);
    }

    for pattern in [&*BRACKETED_LABEL_RE, &*COMMA_PAREN_LABEL_RE, &*BARE_PAREN_LABEL_RE] {
        if let Some(caps) = pattern.captures(label) {
            let authors = caps.get(1).map_or("", |m| m.as_str()).trim().to_string();
            let year = caps.get(2).map_or("", |m| m.as_str()).to_string();
            return BibEntry {
                id: id.to_string(),
                authors,
                year,
                title,
                fallback_label: None,
            };
        }
    }

    // Unrecognized shape: the designed "no data" state.
    BibEntry {
        id: id.to_string(),
        authors: String::new(),
        year: String::new(),
        title,
        fallback_label: Some(label.to_string()),
    }
}

/// Derives authors/year (and, when needed, a title) from the first
/// free-text block of a numerically labeled item.
fn entry_from_first_block(id: &str, label: &str, blocks: &[String], title: String) -> BibEntry {
    let Some(first) = blocks.first() else {
        return BibEntry {
            id: id.to_string(),
            authors: String::new(),
            year: String::new(),
            title,
            fallback_label: Some(label.to_string()),
        };
    };

    let Some(caps) = FIRST_BLOCK_AUTHOR_YEAR_RE.captures(first) else {
        return BibEntry {
            id: id.to_string(),
            authors: String::new(),
            year: String::new(),
            title,
            fallback_label: Some(label.to_string()),
        };
    };

    let name_part = caps.get(1).map_or("", |m| m.as_str());
    let year = caps.get(2).map_or("", |m| m.as_str()).to_string();
    let remainder = caps.get(3).map_or("", |m| m.as_str()).trim().to_string();

    // Title preference: second block, then whatever follows the year in the
    // first block.
    let title = if title.is_empty() { remainder } else { title };

    BibEntry {
        id: id.to_string(),
        authors: surname_from_name_part(name_part),
        year,
        title,
        fallback_label: None,
    }
}

/// Reduces an author name prefix to its surname, trimming trailing initials
/// and preserving an "et al." suffix.
fn surname_from_name_part(name_part: &str) -> String {
    let trimmed = name_part.trim().trim_end_matches([',', ' ']);
    let has_et_al = trimmed.to_ascii_lowercase().contains("et al");

    let without_initials = TRAILING_INITIALS_RE.replace(trimmed, "");
    let surname = without_initials
        .split(',')
        .next()
        .unwrap_or("")
        .trim()
        .to_string();

    if has_et_al && !surname.to_ascii_lowercase().contains("et al") {
        format!("{surname} et al.")
    } else {
        surname
    }
}
