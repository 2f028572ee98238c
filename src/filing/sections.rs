//! Canonical section extraction from marked-up filing bodies.
//!
//! Locates the standard 10-K sections by heading patterns directly in the
//! raw markup, slices the body between headings, and strips each slice to
//! plain text independently. A section that cannot be located, or whose
//! stripped body is too short to be more than a heading, is emitted as an
//! empty string; absence is never an error.

use crate::filing::SectionId;
use regex::Regex;
use scraper::{Html, Node};
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::OnceLock;

/// Minimum plain-text length for a slice to count as a real section body.
pub const MIN_SECTION_LENGTH: usize = 500;

/// Heading patterns per canonical section, most specific first.
///
/// Patterns tolerate non-breaking-space entities between "item" and the
/// item number, which filings frequently use inside headings.
const SECTION_MARKERS: [(SectionId, &[&str]); 4] = [
    (
        SectionId::Business,
        &[
            r"(?i)item(?:\s|&#160;|&nbsp;)+1(?:\s|&#160;|&nbsp;)*\.",
            r"(?i)item(?:\s|&#160;|&nbsp;)+1(?:\s|&#160;|&nbsp;)",
            r"(?i)business(?:\s|&#160;|&nbsp;)+overview",
        ],
    ),
    (
        SectionId::RiskFactors,
        &[
            r"(?i)item(?:\s|&#160;|&nbsp;)+1a(?:\s|&#160;|&nbsp;)*\.",
            r"(?i)item(?:\s|&#160;|&nbsp;)+1a(?:\s|&#160;|&nbsp;)",
            r"(?i)risk(?:\s|&#160;|&nbsp;)+factors",
        ],
    ),
    (
        SectionId::Mda,
        &[
            r"(?i)item(?:\s|&#160;|&nbsp;)+7(?:\s|&#160;|&nbsp;)*\.",
            r"(?i)item(?:\s|&#160;|&nbsp;)+7(?:\s|&#160;|&nbsp;)",
            r"(?i)management(?:&#8217;|&#x2019;|\u{2019}|')s(?:\s|&#160;|&nbsp;)+discussion",
        ],
    ),
    (
        SectionId::Financials,
        &[
            r"(?i)item(?:\s|&#160;|&nbsp;)+8(?:\s|&#160;|&nbsp;)*\.",
            r"(?i)item(?:\s|&#160;|&nbsp;)+8(?:\s|&#160;|&nbsp;)",
            r"(?i)financial(?:\s|&#160;|&nbsp;)+statements",
        ],
    ),
];

/// Tags whose subtrees carry no filing text.
const SKIPPED_TAGS: [&str; 3] = ["script", "style", "head"];

/// Block-level tags that get a newline inserted before and after.
const BLOCK_TAGS: [&str; 8] = ["p", "div", "tr", "h1", "h2", "h3", "h4", "h5"];

/// Returns the compiled heading-pattern table.
fn compiled_markers() -> &'static [(SectionId, Vec<Regex>)] {
    static MARKERS: OnceLock<Vec<(SectionId, Vec<Regex>)>> = OnceLock::new();
    MARKERS.get_or_init(|| {
        SECTION_MARKERS
            .iter()
            .map(|(id, patterns)| {
                let compiled = patterns
                    .iter()
                    .filter_map(|p| Regex::new(p).ok())
                    .collect::<Vec<_>>();
                (*id, compiled)
            })
            .collect()
    })
}

/// Extracts canonical sections from raw marked-up filing bodies.
///
/// # Examples
///
/// ```
/// use toshi_rag::filing::{SectionExtractor, SectionId};
///
/// let sections = SectionExtractor::new().extract("<html><body>no items here</body></html>");
/// assert_eq!(sections[&SectionId::RiskFactors], "");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SectionExtractor;

impl SectionExtractor {
    /// Creates an extractor over the canonical heading table.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Produces the full section map for a raw filing body.
    ///
    /// Headings are matched case-insensitively against the unmodified body,
    /// so byte positions are exact and extracted text preserves case. The
    /// chosen occurrence of each heading is the last match in the document:
    /// filings open with a table of contents whose entries match the same
    /// patterns, and taking the last occurrence skips it.
    #[must_use]
    pub fn extract(&self, raw_body: &str) -> BTreeMap<SectionId, String> {
        let mut sections: BTreeMap<SectionId, String> =
            SectionId::ALL.iter().map(|id| (*id, String::new())).collect();

        // Locate each section heading
        let mut positions: Vec<(SectionId, usize)> = Vec::new();
        for (id, patterns) in compiled_markers() {
            if let Some(pos) = locate_heading(raw_body, patterns) {
                positions.push((*id, pos));
            }
        }
        if positions.is_empty() {
            return sections;
        }

        // Each section's raw slice runs to the next matched section
        positions.sort_by_key(|(_, pos)| *pos);
        for (i, (id, start)) in positions.iter().enumerate() {
            let end = positions
                .get(i + 1)
                .map_or(raw_body.len(), |(_, next)| *next);
            let text = strip_markup(&raw_body[*start..end]);
            if text.len() >= MIN_SECTION_LENGTH {
                sections.insert(*id, text);
            }
        }

        sections
    }
}

/// Finds the heading position for one section.
///
/// Patterns are tried in table order; the first pattern with any match wins
/// and contributes the position of its last occurrence.
fn locate_heading(body: &str, patterns: &[Regex]) -> Option<usize> {
    for pattern in patterns {
        if let Some(m) = pattern.find_iter(body).last() {
            return Some(m.start());
        }
    }
    None
}

/// Strips markup from a raw slice, preserving block structure as newlines.
///
/// A parser failure on the slice yields an empty string so the remaining
/// sections still proceed.
fn strip_markup(fragment: &str) -> String {
    catch_unwind(AssertUnwindSafe(|| {
        let html = Html::parse_fragment(fragment);
        let mut text = String::with_capacity(fragment.len() / 2);
        collect_text(html.tree.root(), &mut text);
        collapse_whitespace(&text)
    }))
    .unwrap_or_default()
}

/// Walks the DOM, appending text nodes and newlines around block elements.
fn collect_text(node: ego_tree::NodeRef<'_, Node>, out: &mut String) {
    for child in node.children() {
        match child.value() {
            Node::Text(t) => out.push_str(&t),
            Node::Element(element) => {
                let name = element.name();
                if SKIPPED_TAGS.contains(&name) {
                    continue;
                }
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.push('\n');
                }
                collect_text(child, out);
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Collapses runs of whitespace: single spaces within lines, no blank lines.
fn collapse_whitespace(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for line in text.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if !collapsed.is_empty() {
            lines.push(collapsed);
        }
    }
    lines.join("\n")
}
