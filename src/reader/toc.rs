//! Table-of-contents extraction and scroll-position tracking.
//!
//! Section headings are scanned in document order. Headings without an id
//! get a deterministic `section-N` one injected, so anchors are stable
//! across repeated loads of the same body. The resulting entries feed a
//! synchronized pair of navigation lists (primary and mobile).
//!
//! [`ScrollSpy`] tracks which entry is active. It is a two-state machine:
//! idle, where debounced scroll movement drives the highlight, and
//! overridden, entered by a navigation click, where scroll events are
//! ignored until a cool-down deadline passes. Timing is injected via
//! [`Instant`] arguments so the machine is fully deterministic under test.

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex::{Captures, Regex};
use tracing::{debug, instrument};

use super::strip_tags;

/// How long a click keeps scroll tracking suppressed.
pub const OVERRIDE_COOLDOWN: Duration = Duration::from_millis(1200);

/// Quiet period after the last scroll event before the highlight updates.
pub const SCROLL_DEBOUNCE: Duration = Duration::from_millis(150);

/// Default distance from the viewport top a heading must reach to count
/// as the current section.
pub const DEFAULT_TOP_OFFSET: f64 = 120.0;

#[allow(clippy::expect_used)]
static SECTION_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<h2([^>]*class="[^"]*ltx_title_section[^"]*"[^>]*)>(.*?)</h2>"#)
        .expect("section heading regex is valid")
});

#[allow(clippy::expect_used)]
static ID_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bid="([^"]+)""#).expect("id attribute regex is valid"));

#[allow(clippy::expect_used)]
static OUTLINE_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\d+(?:\.\d+)*\.?\s+").expect("outline prefix regex is valid")
});

/// One navigation target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    /// Anchor id of the section heading.
    pub section_id: String,
    /// Display label, numeric outline prefix stripped.
    pub label: String,
}

/// The two synchronized navigation lists built from one body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavLists {
    pub primary: Vec<TocEntry>,
    pub mobile: Vec<TocEntry>,
}

impl NavLists {
    fn from_entries(entries: Vec<TocEntry>) -> Self {
        Self { mobile: entries.clone(), primary: entries }
    }
}

/// Scans section headings, injecting ids where missing.
///
/// Returns the (possibly modified) body and the entries in document order.
/// Ids are assigned by position, so the same body always yields the same
/// anchors.
#[instrument(skip(body), fields(body_len = body.len()))]
#[must_use]
pub fn build_toc(body: &str) -> (String, NavLists) {
    let mut entries = Vec::new();
    let mut next_index = 1usize;

    let rewritten = SECTION_HEADING_RE
        .replace_all(body, |caps: &Captures<'_>| {
            let attrs = caps.get(1).map_or("", |m| m.as_str());
            let inner = caps.get(2).map_or("", |m| m.as_str());

            let label = heading_label(inner);
            match ID_ATTR_RE.captures(attrs).and_then(|id| id.get(1)) {
                Some(existing) => {
                    entries.push(TocEntry {
                        section_id: existing.as_str().to_string(),
                        label,
                    });
                    next_index += 1;
                    caps.get(0).map_or(String::new(), |m| m.as_str().to_string())
                }
                None => {
                    let section_id = format!("section-{next_index}");
                    entries.push(TocEntry { section_id: section_id.clone(), label });
                    next_index += 1;
                    format!(r#"<h2 id="{section_id}"{attrs}>{inner}</h2>"#)
                }
            }
        })
        .into_owned();

    debug!(sections = entries.len(), "table of contents built");
    (rewritten, NavLists::from_entries(entries))
}

fn heading_label(heading_inner: &str) -> String {
    let text = strip_tags(heading_inner);
    OUTLINE_PREFIX_RE.replace(text.trim(), "").trim().to_string()
}

/// Measured position of one heading, in viewport coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadingPosition {
    pub section_id: String,
    pub top: f64,
}

/// Tracking state, exposed for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpyState {
    /// Scroll movement drives the highlight.
    Idle,
    /// A click pinned the highlight; scroll events are ignored until the
    /// cool-down deadline.
    Overridden,
}

/// Deterministic scroll-position tracker.
///
/// The host reports clicks and scroll events with their timestamps and
/// calls [`ScrollSpy::tick`] with current heading positions; the spy owns
/// all debounce and cool-down bookkeeping.
#[derive(Debug)]
pub struct ScrollSpy {
    top_offset: f64,
    viewport_height: f64,
    active: Option<String>,
    override_until: Option<Instant>,
    last_scroll_at: Option<Instant>,
}

impl ScrollSpy {
    #[must_use]
    pub fn new(top_offset: f64, viewport_height: f64) -> Self {
        Self {
            top_offset,
            viewport_height,
            active: None,
            override_until: None,
            last_scroll_at: None,
        }
    }

    /// Currently highlighted section, if any.
    #[must_use]
    pub fn active_section(&self) -> Option<&str> {
        self.active.as_deref()
    }

    #[must_use]
    pub fn state(&self, now: Instant) -> SpyState {
        match self.override_until {
            Some(deadline) if now < deadline => SpyState::Overridden,
            _ => SpyState::Idle,
        }
    }

    /// A navigation click: the clicked section becomes active immediately
    /// and scroll tracking is suppressed for the cool-down window.
    pub fn note_click(&mut self, section_id: &str, now: Instant) {
        self.active = Some(section_id.to_string());
        self.override_until = Some(now + OVERRIDE_COOLDOWN);
        self.last_scroll_at = None;
    }

    /// A raw scroll event; the highlight updates only after the debounce
    /// quiet period, via [`ScrollSpy::tick`].
    pub fn note_scroll(&mut self, now: Instant) {
        self.last_scroll_at = Some(now);
    }

    /// Advances the machine. Returns `true` when the active section changed.
    pub fn tick(&mut self, now: Instant, positions: &[HeadingPosition]) -> bool {
        if let Some(deadline) = self.override_until {
            if now < deadline {
                // Cool-down wins over any pending debounce, even one that
                // started before the click.
                self.last_scroll_at = None;
                return false;
            }
            self.override_until = None;
            self.last_scroll_at = None;
            return self.recompute(positions);
        }

        if let Some(scrolled_at) = self.last_scroll_at
            && now.duration_since(scrolled_at) >= SCROLL_DEBOUNCE
        {
            self.last_scroll_at = None;
            return self.recompute(positions);
        }
        false
    }

    /// Picks the heading closest to, but not below, the top offset. When
    /// none qualifies, falls back to the last heading still above the
    /// viewport bottom.
    fn recompute(&mut self, positions: &[HeadingPosition]) -> bool {
        let chosen = positions
            .iter()
            .filter(|pos| pos.top <= self.top_offset)
            .max_by(|a, b| a.top.total_cmp(&b.top))
            .or_else(|| {
                positions
                    .iter()
                    .filter(|pos| pos.top < self.viewport_height)
                    .next_back()
            })
            .map(|pos| pos.section_id.clone());

        if chosen == self.active {
            return false;
        }
        self.active = chosen;
        true
    }
}
