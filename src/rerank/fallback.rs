//! Lexical fallback reranker.
//!
//! Scores `(query, passage)` pairs by token overlap when no cross-encoder
//! model is available. Relevance between 0.0 and 1.0.

use crate::Result;
use crate::rerank::Reranker;

/// Token-overlap reranker.
///
/// Not a joint encoder - scores are a normalized count of query tokens
/// appearing in the passage, blended with the match ratio. Deterministic,
/// which is what the offline tests need.
pub struct LexicalReranker;

impl LexicalReranker {
    /// Creates a lexical reranker.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Tokenizes text into lowercase words, skipping short tokens.
    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| s.len() > 2)
            .map(ToString::to_string)
            .collect()
    }

    /// Scores a single passage against pre-tokenized query tokens.
    #[allow(clippy::cast_precision_loss)]
    fn score_passage(query_tokens: &[String], passage: &str) -> f32 {
        if query_tokens.is_empty() {
            return 0.5;
        }

        let passage_tokens = Self::tokenize(passage);
        let matches = query_tokens
            .iter()
            .filter(|t| passage_tokens.contains(t))
            .count();

        let match_ratio = matches as f32 / query_tokens.len() as f32;
        match_ratio.clamp(0.0, 1.0)
    }
}

impl Default for LexicalReranker {
    fn default() -> Self {
        Self::new()
    }
}

impl Reranker for LexicalReranker {
    fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>> {
        let query_tokens = Self::tokenize(query);
        Ok(passages
            .iter()
            .map(|p| Self::score_passage(&query_tokens, p))
            .collect())
    }
}
