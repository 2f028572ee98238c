//! Word-window chunker for filing sections.
//!
//! Splits each extracted section into overlapping, metadata-tagged chunks.
//! Pure transformation; no I/O. Chunking is deterministic, so chunk ids are
//! stable across re-ingestion and duplicate inserts become no-ops.

use crate::filing::{Filing, FilingChunk, PARENT_SECTION_CAP};

/// Chunk size in words (~400 words ≈ 500 tokens for English text).
pub const CHUNK_SIZE_WORDS: usize = 400;

/// Overlap in words shared between consecutive chunks.
pub const OVERLAP_WORDS: usize = 50;

/// Minimum words for a chunk to be worth keeping.
pub const MIN_CHUNK_WORDS: usize = 50;

/// Window stride: consecutive chunks start this many words apart.
const STRIDE: usize = CHUNK_SIZE_WORDS - OVERLAP_WORDS;

/// Splits filings into overlapping word-window chunks.
///
/// # Examples
///
/// ```
/// use toshi_rag::filing::{Filing, FilingChunker, SectionId};
///
/// let mut filing = Filing::empty("Apple Inc.", "0000320193", "2024", "10-K");
/// filing.sections.insert(SectionId::RiskFactors, "risk ".repeat(100).trim().to_string());
/// let chunks = FilingChunker::new().chunk_filing(&filing);
/// assert_eq!(chunks[0].chunk_id, "0000320193_2024_risk_factors_0");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FilingChunker;

impl FilingChunker {
    /// Creates a chunker with the canonical window parameters.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Chunks every non-empty section of a filing into a flat ordered list.
    ///
    /// Sections shorter than [`MIN_CHUNK_WORDS`] words are skipped entirely.
    #[must_use]
    pub fn chunk_filing(&self, filing: &Filing) -> Vec<FilingChunk> {
        let mut all_chunks = Vec::new();

        for (section_id, section_text) in &filing.sections {
            if section_text.is_empty() {
                continue;
            }
            let words: Vec<&str> = section_text.split_whitespace().collect();
            if words.len() < MIN_CHUNK_WORDS {
                continue;
            }
            all_chunks.extend(self.chunk_section(filing, section_id.as_str(), &words, section_text));
        }

        all_chunks
    }

    /// Chunks multiple filings at once, preserving filing order.
    #[must_use]
    pub fn chunk_filings(&self, filings: &[Filing]) -> Vec<FilingChunk> {
        filings
            .iter()
            .flat_map(|filing| self.chunk_filing(filing))
            .collect()
    }

    /// Splits a single section into overlapping word windows.
    fn chunk_section(
        &self,
        filing: &Filing,
        section: &str,
        words: &[&str],
        section_text: &str,
    ) -> Vec<FilingChunk> {
        let parent_section = truncate_chars(section_text, PARENT_SECTION_CAP);
        let mut chunks = Vec::new();
        let mut start = 0;
        let mut index = 0;

        while start < words.len() {
            let end = (start + CHUNK_SIZE_WORDS).min(words.len());
            // Remaining tail too short to be useful
            if end - start < MIN_CHUNK_WORDS {
                break;
            }

            chunks.push(FilingChunk {
                chunk_id: format!("{}_{}_{}_{}", filing.cik, filing.year, section, index),
                text: words[start..end].join(" "),
                company: filing.company.clone(),
                cik: filing.cik.clone(),
                year: filing.year.clone(),
                quarter: filing.quarter.clone(),
                filing_type: filing.filing_type.clone(),
                section: section.to_string(),
                parent_section: parent_section.clone(),
            });

            index += 1;
            start += STRIDE;
        }

        chunks
    }
}

/// Truncates a string to at most `max_chars` characters on a char boundary.
fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
