//! `FastEmbed`-based semantic embedder.
//!
//! Provides real semantic embeddings using the all-MiniLM-L6-v2 model via
//! fastembed-rs. Only available when the `fastembed-embeddings` feature is
//! enabled.

use crate::Result;
use crate::embedding::{
    DIMENSIONS, EMBED_BATCH_SIZE, Embedder, partition_non_empty, scatter_embeddings,
};
use crate::error::StorageError;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::OnceLock;

/// Process-wide singleton for the embedding model.
static EMBEDDING_MODEL: OnceLock<std::sync::Mutex<fastembed::TextEmbedding>> = OnceLock::new();

/// `FastEmbed` embedder using all-MiniLM-L6-v2.
///
/// The model is loaded once at construction and shared process-wide.
/// Construction failure is fatal to the caller: the process cannot serve
/// queries without the model, and loading inside request paths would make
/// first-query latency unbounded.
///
/// # Examples
///
/// ```ignore
/// use toshi_rag::embedding::FastEmbedEmbedder;
///
/// let embedder = FastEmbedEmbedder::new()?;
/// let embedding = embedder.embed("Risk factors include supply chain disruption.")?;
/// assert_eq!(embedding.len(), 384);
/// ```
pub struct FastEmbedEmbedder {
    /// Model name for debugging.
    model_name: &'static str,
}

impl FastEmbedEmbedder {
    /// Creates the embedder, loading the model if not already loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if model initialization fails.
    pub fn new() -> Result<Self> {
        Self::get_model()?;
        Ok(Self {
            model_name: "all-MiniLM-L6-v2",
        })
    }

    /// Gets or initializes the embedding model (thread-safe).
    fn get_model() -> Result<&'static std::sync::Mutex<fastembed::TextEmbedding>> {
        if let Some(model) = EMBEDDING_MODEL.get() {
            return Ok(model);
        }

        let options = fastembed::InitOptions::new(fastembed::EmbeddingModel::AllMiniLML6V2)
            .with_show_download_progress(false);

        let model = fastembed::TextEmbedding::try_new(options)
            .map_err(|e| StorageError::Embedding(format!("Failed to load embedding model: {e}")))?;

        // Store the model, ignoring if another thread beat us to it
        let _ = EMBEDDING_MODEL.set(std::sync::Mutex::new(model));

        EMBEDDING_MODEL.get().ok_or_else(|| {
            StorageError::Embedding("Model initialization race condition".to_string()).into()
        })
    }

    /// Returns the model name.
    #[must_use]
    pub const fn model_name(&self) -> &'static str {
        self.model_name
    }

    /// Runs the model over non-empty texts, panic-guarded.
    ///
    /// ONNX runtime can panic on malformed inputs or internal errors; the
    /// panic is converted to an embedding error instead of unwinding through
    /// the retrieval pipeline.
    fn encode(texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let model = Self::get_model()?;
        let mut model = model
            .lock()
            .map_err(|e| StorageError::Embedding(format!("Failed to lock embedding model: {e}")))?;

        let result = catch_unwind(AssertUnwindSafe(|| {
            model.embed(texts.to_vec(), Some(EMBED_BATCH_SIZE))
        }));

        result
            .map_err(|panic_info| {
                let panic_msg = panic_info
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic_info.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                crate::Error::Storage(StorageError::Embedding(format!(
                    "ONNX runtime panic: {panic_msg}"
                )))
            })?
            .map_err(|e| {
                crate::Error::Storage(StorageError::Embedding(format!("Embedding failed: {e}")))
            })
    }
}

impl Embedder for FastEmbedEmbedder {
    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; DIMENSIONS]);
        }

        let embeddings = Self::encode(&[text])?;
        embeddings.into_iter().next().ok_or_else(|| {
            StorageError::Embedding("No embedding returned from model".to_string()).into()
        })
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let (valid, indices) = partition_non_empty(texts);
        if valid.is_empty() {
            return Ok(vec![vec![0.0; DIMENSIONS]; texts.len()]);
        }

        let embeddings = Self::encode(&valid)?;
        Ok(scatter_embeddings(
            texts.len(),
            DIMENSIONS,
            &indices,
            embeddings,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tests that require the model download are marked #[ignore].
    // Run with: cargo test --features fastembed-embeddings -- --ignored

    #[test]
    #[ignore = "requires fastembed model download"]
    fn test_embedder_creation() {
        let embedder = FastEmbedEmbedder::new().unwrap();
        assert_eq!(embedder.dimensions(), DIMENSIONS);
        assert_eq!(embedder.model_name(), "all-MiniLM-L6-v2");
    }

    #[test]
    #[ignore = "requires fastembed model download"]
    fn test_embed_normalized() {
        let embedder = FastEmbedEmbedder::new().unwrap();
        let emb = embedder.embed("The Company faces intense competition.").unwrap();
        assert_eq!(emb.len(), DIMENSIONS);
        let magnitude: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-4);
    }

    #[test]
    #[ignore = "requires fastembed model download"]
    fn test_embed_empty_returns_zero_vector() {
        let embedder = FastEmbedEmbedder::new().unwrap();
        let emb = embedder.embed("").unwrap();
        assert!(emb.iter().all(|&x| x == 0.0));
    }

    #[test]
    #[ignore = "requires fastembed model download"]
    fn test_embed_batch_scatters_empty_rows() {
        let embedder = FastEmbedEmbedder::new().unwrap();
        let texts = vec!["Revenue grew this year.", "", "Debt increased."];
        let embeddings = embedder.embed_batch(&texts).unwrap();
        assert_eq!(embeddings.len(), 3);
        assert!(embeddings[1].iter().all(|&x| x == 0.0));
        assert!(embeddings[0].iter().any(|&x| x != 0.0));
    }
}
