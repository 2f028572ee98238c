//! Hash-based fallback embedder.
//!
//! Provides deterministic pseudo-embeddings when `FastEmbed` is not
//! available. Similar text clusters by word overlap rather than semantics,
//! which is enough for the retrieval pipeline's tests to run offline.

use crate::Result;
use crate::embedding::{Embedder, partition_non_empty, scatter_embeddings};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Hash-based fallback embedder.
///
/// Generates deterministic pseudo-embeddings using a combination of:
/// - Word-level hashing for vocabulary capture
/// - Character trigram hashing for fuzzy matching
/// - Normalization to unit length for cosine similarity
///
/// This is NOT semantic similarity - it's based on lexical overlap.
/// Use `FastEmbed` for true semantic understanding.
///
/// # Examples
///
/// ```
/// use toshi_rag::embedding::{DIMENSIONS, Embedder, HashEmbedder};
///
/// let embedder = HashEmbedder::new(DIMENSIONS);
/// let emb1 = embedder.embed("risk factors").unwrap();
/// let emb2 = embedder.embed("risk factors").unwrap();
/// assert_eq!(emb1, emb2); // Deterministic
/// ```
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    /// Creates a new hash embedder with the specified dimensions.
    #[must_use]
    pub const fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Hashes a string to a u64 value.
    fn hash_string(s: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        hasher.finish()
    }

    /// Generates a pseudo-embedding from text.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn generate_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];

        // Normalize text: lowercase and basic cleanup
        let normalized: String = text
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c.is_whitespace() {
                    c.to_ascii_lowercase()
                } else {
                    ' '
                }
            })
            .collect();

        // Word-level hashing (primary signal)
        for word in normalized.split_whitespace() {
            let hash = Self::hash_string(word);
            let idx = (hash as usize) % self.dimensions;
            let sign = if (hash >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            let magnitude = 1.0 + ((hash >> 16) & 0xFF) as f32 / 255.0;
            embedding[idx] += sign * magnitude;
        }

        // Character trigram hashing (secondary signal for fuzzy matching)
        let chars: Vec<char> = normalized.chars().collect();
        if chars.len() >= 3 {
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                let hash = Self::hash_string(&trigram);
                let idx = (hash as usize) % self.dimensions;
                let sign = if (hash >> 32) & 1 == 0 { 0.5 } else { -0.5 };
                embedding[idx] += sign;
            }
        }

        // Normalize to unit length for cosine similarity
        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for val in &mut embedding {
                *val /= magnitude;
            }
        }

        embedding
    }
}

impl Embedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimensions]);
        }
        Ok(self.generate_embedding(text))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        use rayon::prelude::*;

        let (valid, indices) = partition_non_empty(texts);
        let embeddings: Vec<Vec<f32>> = valid
            .par_iter()
            .map(|text| self.generate_embedding(text))
            .collect();

        Ok(scatter_embeddings(
            texts.len(),
            self.dimensions,
            &indices,
            embeddings,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{DIMENSIONS, cosine_similarity};

    #[test]
    fn test_deterministic() {
        let embedder = HashEmbedder::new(DIMENSIONS);
        let emb1 = embedder.embed("supply chain disruption").unwrap();
        let emb2 = embedder.embed("supply chain disruption").unwrap();
        assert_eq!(emb1, emb2);
    }

    #[test]
    fn test_dimensions() {
        let embedder = HashEmbedder::new(DIMENSIONS);
        let emb = embedder.embed("test").unwrap();
        assert_eq!(emb.len(), DIMENSIONS);
    }

    #[test]
    fn test_normalized() {
        let embedder = HashEmbedder::new(DIMENSIONS);
        let emb = embedder.embed("regulatory compliance costs").unwrap();
        let magnitude: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_similar_text_higher_similarity() {
        let embedder = HashEmbedder::new(DIMENSIONS);
        let emb_base = embedder.embed("risks in international markets").unwrap();
        let emb_similar = embedder.embed("risks in domestic markets").unwrap();
        let emb_different = embedder.embed("completely unrelated text").unwrap();

        let sim_similar = cosine_similarity(&emb_base, &emb_similar);
        let sim_different = cosine_similarity(&emb_base, &emb_different);

        assert!(
            sim_similar > sim_different,
            "Similar text should have higher similarity: {sim_similar} vs {sim_different}"
        );
    }

    #[test]
    fn test_empty_text_zero_vector() {
        let embedder = HashEmbedder::new(DIMENSIONS);
        let emb = embedder.embed("").unwrap();
        assert_eq!(emb.len(), DIMENSIONS);
        assert!(emb.iter().all(|&x| x == 0.0));

        let emb = embedder.embed("   ").unwrap();
        assert!(emb.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_batch_scatter_with_empty_entries() {
        let embedder = HashEmbedder::new(DIMENSIONS);
        let texts = vec!["revenue", "", "debt covenants"];
        let embeddings = embedder.embed_batch(&texts).unwrap();

        assert_eq!(embeddings.len(), 3);
        assert!(embeddings[1].iter().all(|&x| x == 0.0));
        assert_eq!(embeddings[0], embedder.embed("revenue").unwrap());
        assert_eq!(embeddings[2], embedder.embed("debt covenants").unwrap());
    }

    #[test]
    fn test_batch_all_empty() {
        let embedder = HashEmbedder::new(DIMENSIONS);
        let texts = vec!["", "  "];
        let embeddings = embedder.embed_batch(&texts).unwrap();
        assert_eq!(embeddings.len(), 2);
        assert!(embeddings.iter().flatten().all(|&x| x == 0.0));
    }

    #[test]
    fn test_batch_empty_list() {
        let embedder = HashEmbedder::new(DIMENSIONS);
        let embeddings = embedder.embed_batch(&[]).unwrap();
        assert!(embeddings.is_empty());
    }
}
