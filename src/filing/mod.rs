//! Filing domain types.
//!
//! A [`Filing`] is a single regulatory submission with its extracted
//! sections; a [`FilingChunk`] is the atomic retrieval unit carved out of a
//! section; a [`Citation`] is what callers ultimately receive.

pub mod chunker;
pub mod sections;

pub use chunker::{CHUNK_SIZE_WORDS, FilingChunker, MIN_CHUNK_WORDS, OVERLAP_WORDS};
pub use sections::{MIN_SECTION_LENGTH, SectionExtractor};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum characters of parent-section text carried by each chunk.
pub const PARENT_SECTION_CAP: usize = 2_000;

/// Canonical 10-K/10-Q section identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionId {
    /// Item 1 - business overview.
    Business,
    /// Item 1A - risk factors.
    RiskFactors,
    /// Item 7 - management's discussion and analysis.
    Mda,
    /// Item 8 - financial statements.
    Financials,
}

impl SectionId {
    /// All canonical sections, in document order.
    pub const ALL: [Self; 4] = [Self::Business, Self::RiskFactors, Self::Mda, Self::Financials];

    /// Stable snake_case name used in chunk ids and index metadata.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Business => "business",
            Self::RiskFactors => "risk_factors",
            Self::Mda => "mda",
            Self::Financials => "financials",
        }
    }

    /// Human-readable label for citation rendering.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Business => "Business Overview",
            Self::RiskFactors => "Risk Factors",
            Self::Mda => "MD&A",
            Self::Financials => "Financial Statements",
        }
    }
}

impl std::fmt::Display for SectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single regulatory submission after section extraction.
///
/// Immutable once created; cached in the fetch cache keyed by
/// `{cik}_{accession}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filing {
    /// Company display name.
    pub company: String,
    /// 10-digit zero-padded company identifier.
    pub cik: String,
    /// Four-digit fiscal year.
    pub year: String,
    /// Quarter tag (`QTR1`..`QTR4`) for quarterly filings.
    pub quarter: Option<String>,
    /// Filing type, e.g. "10-K" or "10-Q".
    pub filing_type: String,
    /// Extracted plain-text sections. Sections that could not be located
    /// are present with an empty body.
    pub sections: BTreeMap<SectionId, String>,
}

impl Filing {
    /// Creates a filing with all sections empty.
    ///
    /// Used when a document could not be fetched or parsed; absence of
    /// content is not an error at this layer.
    #[must_use]
    pub fn empty(company: &str, cik: &str, year: &str, filing_type: &str) -> Self {
        Self {
            company: company.to_string(),
            cik: cik.to_string(),
            year: year.to_string(),
            quarter: None,
            filing_type: filing_type.to_string(),
            sections: SectionId::ALL
                .iter()
                .map(|id| (*id, String::new()))
                .collect(),
        }
    }

    /// Whether every section body is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.values().all(String::is_empty)
    }
}

/// The atomic retrieval unit: a bounded word window over a filing section
/// with full provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingChunk {
    /// Deterministic id: `{cik}_{year}_{section}_{index}`.
    pub chunk_id: String,
    /// Chunk text.
    pub text: String,
    /// Company display name.
    pub company: String,
    /// 10-digit zero-padded company identifier.
    pub cik: String,
    /// Four-digit fiscal year.
    pub year: String,
    /// Quarter tag for quarterly filings.
    pub quarter: Option<String>,
    /// Filing type, e.g. "10-K".
    pub filing_type: String,
    /// Section name this chunk was carved from.
    pub section: String,
    /// Leading excerpt of the parent section (capped at
    /// [`PARENT_SECTION_CAP`] characters) for display-time expansion.
    pub parent_section: String,
}

/// A cited passage returned to callers.
///
/// Raw embeddings and other retrieval internals never appear here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    /// Passage text (possibly trimmed to relevant sentences by CRAG).
    pub text: String,
    /// Company display name.
    pub company: String,
    /// 10-digit zero-padded company identifier.
    pub cik: String,
    /// Four-digit fiscal year.
    pub year: String,
    /// Quarter tag for quarterly filings.
    pub quarter: Option<String>,
    /// Filing type, e.g. "10-K".
    pub filing_type: String,
    /// Section name the passage came from.
    pub section: String,
    /// Cross-encoder score, rounded to 4 decimals.
    pub rerank_score: f32,
    /// Whether CRAG trimmed the passage to keyword-bearing sentences.
    pub crag_trimmed: bool,
}
