//! Cross-encoder reranking backends.
//!
//! The final retrieval stage scores `(query, passage)` pairs jointly, which
//! is more accurate than independently encoded cosine similarity. With the
//! `fastembed-embeddings` feature a real cross-encoder model is used;
//! without it a lexical overlap scorer keeps the pipeline testable offline.

mod fallback;

#[cfg(feature = "fastembed-embeddings")]
mod fastembed_impl;

pub use fallback::LexicalReranker;

#[cfg(feature = "fastembed-embeddings")]
pub use fastembed_impl::CrossEncoderReranker;

use crate::Result;

/// Trait for reranking backends.
///
/// Implementations score each `(query, passage)` pair and return scores in
/// passage input order; callers sort. Higher is more relevant.
pub trait Reranker: Send + Sync {
    /// Scores each passage against the query.
    ///
    /// # Errors
    ///
    /// Returns an error if the model call fails.
    fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>>;
}

/// Creates the default reranker based on available features.
///
/// - With `fastembed-embeddings`: Returns `CrossEncoderReranker` (model
///   loads eagerly; a load failure is fatal)
/// - Without: Returns `LexicalReranker`
///
/// # Errors
///
/// Returns an error if reranker initialization fails.
#[cfg(feature = "fastembed-embeddings")]
pub fn create_reranker() -> Result<Box<dyn Reranker>> {
    Ok(Box::new(CrossEncoderReranker::new()?))
}

/// Creates the default reranker based on available features.
///
/// - With `fastembed-embeddings`: Returns `CrossEncoderReranker`
/// - Without: Returns `LexicalReranker` (never fails)
///
/// # Errors
///
/// Returns an error if reranker initialization fails (never fails for fallback).
#[cfg(not(feature = "fastembed-embeddings"))]
pub fn create_reranker() -> Result<Box<dyn Reranker>> {
    Ok(Box::new(LexicalReranker::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_reranker_scores_in_order() {
        // Construction only; scoring is exercised per-backend. The fallback
        // backend keeps this test model-free.
        let reranker = LexicalReranker::new();
        let scores = reranker
            .score("china risks", &["risks in china", "european sales"])
            .unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores[0] > scores[1]);
    }
}
