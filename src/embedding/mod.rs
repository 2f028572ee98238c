//! Embedding generation for filing retrieval.
//!
//! Encodes text into fixed-dimensional unit-norm vectors using fastembed
//! (when available) or a hash-based fallback for deterministic
//! pseudo-embeddings.
//!
//! # Feature Flags
//!
//! - `fastembed-embeddings`: Enables `FastEmbed` with all-MiniLM-L6-v2 (384 dimensions)
//! - Without the feature: Uses hash-based fallback (deterministic but not semantic)

mod fallback;

#[cfg(feature = "fastembed-embeddings")]
mod fastembed_impl;

pub use fallback::HashEmbedder;

#[cfg(feature = "fastembed-embeddings")]
pub use fastembed_impl::FastEmbedEmbedder;

use crate::Result;

/// Embedding dimensions for the all-MiniLM-L6-v2 model.
///
/// This is the authoritative source for embedding dimensions across the
/// codebase; the index and both embedder backends use it.
pub const DIMENSIONS: usize = 384;

/// Batch size for model encode calls.
#[cfg(feature = "fastembed-embeddings")]
const EMBED_BATCH_SIZE: usize = 32;

/// Trait for embedding generators.
///
/// Implementations must be thread-safe (`Send + Sync`). All non-zero outputs
/// are L2-normalized, so downstream similarity is a plain dot product.
///
/// # Examples
///
/// ```
/// use toshi_rag::embedding::{DIMENSIONS, Embedder, HashEmbedder};
///
/// let embedder = HashEmbedder::new(DIMENSIONS);
/// let embedding = embedder.embed("risk factors").unwrap();
/// assert_eq!(embedding.len(), DIMENSIONS);
/// ```
pub trait Embedder: Send + Sync {
    /// Returns the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Generates an embedding for the given text.
    ///
    /// Empty (or whitespace-only) input returns the zero vector, not an
    /// error; empty sections are routine in this corpus.
    ///
    /// # Errors
    ///
    /// Returns an error if the model call fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generates embeddings for multiple texts, in input order.
    ///
    /// Empty entries map to zero rows. Implementations should filter empty
    /// entries out before the model call and scatter results back into the
    /// output at their original positions.
    ///
    /// # Errors
    ///
    /// Returns an error if the model call fails.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Creates the default embedder based on available features.
///
/// - With `fastembed-embeddings`: Returns `FastEmbedEmbedder` (model loads
///   eagerly; a load failure is fatal because the process cannot serve
///   queries without it)
/// - Without: Returns `HashEmbedder`
///
/// # Errors
///
/// Returns an error if embedder initialization fails.
#[cfg(feature = "fastembed-embeddings")]
pub fn create_embedder() -> Result<Box<dyn Embedder>> {
    Ok(Box::new(FastEmbedEmbedder::new()?))
}

/// Creates the default embedder based on available features.
///
/// - With `fastembed-embeddings`: Returns `FastEmbedEmbedder`
/// - Without: Returns `HashEmbedder` (never fails)
///
/// # Errors
///
/// Returns an error if embedder initialization fails (never fails for fallback).
#[cfg(not(feature = "fastembed-embeddings"))]
pub fn create_embedder() -> Result<Box<dyn Embedder>> {
    Ok(Box::new(HashEmbedder::new(DIMENSIONS)))
}

/// Computes the dot product of two vectors.
///
/// For unit-norm vectors this is the cosine similarity. Returns 0.0 if the
/// lengths differ.
#[must_use]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Computes cosine similarity between two embedding vectors.
///
/// Returns a value between -1.0 (opposite) and 1.0 (identical), or 0.0 for
/// mismatched lengths or zero-magnitude inputs.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product = dot(a, b);
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot_product / (mag_a * mag_b)
}

/// Splits a batch into non-empty texts and their original positions.
///
/// Shared by both backends so empty entries deterministically become zero
/// rows in the scattered output.
pub(crate) fn partition_non_empty<'a>(texts: &[&'a str]) -> (Vec<&'a str>, Vec<usize>) {
    let mut valid = Vec::with_capacity(texts.len());
    let mut indices = Vec::with_capacity(texts.len());
    for (i, text) in texts.iter().enumerate() {
        if !text.trim().is_empty() {
            valid.push(*text);
            indices.push(i);
        }
    }
    (valid, indices)
}

/// Scatters embeddings of the non-empty texts back to their original
/// positions, with zero rows elsewhere.
pub(crate) fn scatter_embeddings(
    total: usize,
    dimensions: usize,
    indices: &[usize],
    embeddings: Vec<Vec<f32>>,
) -> Vec<Vec<f32>> {
    let mut result = vec![vec![0.0f32; dimensions]; total];
    for (embedding, original_idx) in embeddings.into_iter().zip(indices.iter()) {
        result[*original_idx] = embedding;
    }
    result
}
