//! The retrieval pipeline: HyDE -> MMR -> CRAG -> rerank.
//!
//! Substages run in fixed order and are pure with respect to index state.
//! Only the MMR stage can terminate retrieval early (no candidates); every
//! later stage preserves at least one chunk once any candidates exist.

pub mod crag;
pub mod hyde;
pub mod keywords;
pub mod mmr;

pub use crag::{CRAG_AMBIGUOUS, CRAG_CORRECT, crag_filter};
pub use hyde::{HydeExpander, QueryExpander};
pub use mmr::{MMR_LAMBDA, mmr_select};

use crate::Result;
use crate::embedding::Embedder;
use crate::filing::FilingChunk;
use crate::index::{IndexFilter, VectorIndex};
use crate::rerank::Reranker;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, warn};

/// Final number of chunks returned per retrieval.
pub const TOP_K: usize = 5;

/// Raw-similarity candidates requested per target year.
pub const N_PER_YEAR: usize = 10;

/// Cap on the candidate union across years.
pub const MAX_CANDIDATES: usize = 50;

/// Number of chunks MMR selects from the candidate union.
pub const MMR_RESULTS: usize = 20;

/// A chunk traveling through the post-MMR stages.
///
/// Embeddings are already dropped; CRAG and rerank annotate in place.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    /// The chunk with full provenance (text may be CRAG-trimmed).
    pub chunk: FilingChunk,
    /// Raw similarity to the expanded query (transient, never persisted).
    pub similarity: f32,
    /// Whether CRAG trimmed the text to keyword-bearing sentences.
    pub crag_trimmed: bool,
    /// Cross-encoder score, rounded to 4 decimals; `None` when the rerank
    /// model was bypassed (single-chunk input).
    pub rerank_score: Option<f32>,
}

impl From<RetrievedChunk> for crate::filing::Citation {
    fn from(retrieved: RetrievedChunk) -> Self {
        let chunk = retrieved.chunk;
        Self {
            text: chunk.text,
            company: chunk.company,
            cik: chunk.cik,
            year: chunk.year,
            quarter: chunk.quarter,
            filing_type: chunk.filing_type,
            section: chunk.section,
            rerank_score: retrieved.rerank_score.unwrap_or(0.0),
            crag_trimmed: retrieved.crag_trimmed,
        }
    }
}

/// Executes the four-stage retrieval over a vector index.
pub struct Retriever<'a> {
    index: &'a dyn VectorIndex,
    embedder: &'a dyn Embedder,
    reranker: &'a dyn Reranker,
    expander: &'a dyn QueryExpander,
}

/// Shared default expander instance.
static HYDE: HydeExpander = HydeExpander::new();

impl<'a> Retriever<'a> {
    /// Creates a retriever with the standard HyDE expander.
    #[must_use]
    pub fn new(
        index: &'a dyn VectorIndex,
        embedder: &'a dyn Embedder,
        reranker: &'a dyn Reranker,
    ) -> Self {
        Self {
            index,
            embedder,
            reranker,
            expander: &HYDE,
        }
    }

    /// Creates a retriever with a custom query expander.
    #[must_use]
    pub fn with_expander(
        index: &'a dyn VectorIndex,
        embedder: &'a dyn Embedder,
        reranker: &'a dyn Reranker,
        expander: &'a dyn QueryExpander,
    ) -> Self {
        Self {
            index,
            embedder,
            reranker,
            expander,
        }
    }

    /// Runs the full pipeline for one query.
    ///
    /// Returns at most [`TOP_K`] chunks; empty only when the index holds no
    /// candidates for the company and years.
    ///
    /// # Errors
    ///
    /// Returns an error if the index or a model call fails.
    pub fn retrieve(
        &self,
        query: &str,
        cik: &str,
        years: &[String],
    ) -> Result<Vec<RetrievedChunk>> {
        let expanded = self.expand_query(query);
        debug!(raw = query, expanded = expanded.as_str(), "query expanded");

        let selected = self.mmr_candidates(&expanded, cik, years)?;
        if selected.is_empty() {
            return Ok(Vec::new());
        }
        debug!(candidates = selected.len(), "candidates after diversification");

        let filtered = crag_filter(self.embedder, query, selected)?;
        debug!(survivors = filtered.len(), "chunks after self-critique");

        self.rerank_stage(query, filtered)
    }

    /// HyDE stage with panic fallback.
    ///
    /// Expansion must never abort retrieval: a panicking expander downgrades
    /// to the raw query.
    fn expand_query(&self, query: &str) -> String {
        catch_unwind(AssertUnwindSafe(|| self.expander.expand(query))).unwrap_or_else(|_| {
            warn!("query expansion failed, falling back to raw query");
            query.to_string()
        })
    }

    /// MMR stage: per-year raw-similarity recall, then one diversity pass.
    ///
    /// Each target year is queried separately so a single dominant year
    /// cannot crowd out the rest of the window; a company-only query is the
    /// fallback when the per-year union is empty.
    fn mmr_candidates(
        &self,
        expanded_query: &str,
        cik: &str,
        years: &[String],
    ) -> Result<Vec<RetrievedChunk>> {
        let query_embedding = self.embedder.embed(expanded_query)?;

        let mut candidates = Vec::new();
        for year in years {
            let filter = IndexFilter::company(cik).with_year(year);
            candidates.extend(self.index.query(&query_embedding, &filter, N_PER_YEAR)?);
            if candidates.len() >= MAX_CANDIDATES {
                break;
            }
        }
        candidates.truncate(MAX_CANDIDATES);

        if candidates.is_empty() {
            candidates =
                self.index
                    .query(&query_embedding, &IndexFilter::company(cik), MAX_CANDIDATES)?;
        }

        let selected = mmr_select(&query_embedding, candidates, MMR_RESULTS, MMR_LAMBDA);

        // Embeddings stop here; callers past the retriever never see raw
        // vectors.
        Ok(selected
            .into_iter()
            .map(|m| RetrievedChunk {
                chunk: m.chunk,
                similarity: m.similarity,
                crag_trimmed: false,
                rerank_score: None,
            })
            .collect())
    }

    /// Cross-encoder stage: joint scoring on the raw query, top-K output.
    fn rerank_stage(
        &self,
        raw_query: &str,
        chunks: Vec<RetrievedChunk>,
    ) -> Result<Vec<RetrievedChunk>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        if chunks.len() == 1 {
            // Nothing to reorder; the model is bypassed
            return Ok(chunks);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.chunk.text.as_str()).collect();
        let scores = self.reranker.score(raw_query, &texts)?;

        let mut ranked: Vec<RetrievedChunk> = chunks
            .into_iter()
            .zip(scores)
            .map(|(mut chunk, score)| {
                chunk.rerank_score = Some(round4(score));
                chunk
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.rerank_score
                .partial_cmp(&a.rerank_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(TOP_K);

        Ok(ranked)
    }
}

/// Rounds a score to 4 decimal places.
fn round4(value: f32) -> f32 {
    (value * 10_000.0).round() / 10_000.0
}
