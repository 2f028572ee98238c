//! `FastEmbed`-based cross-encoder reranker.
//!
//! Scores `(query, passage)` pairs jointly with a reranker model via
//! fastembed-rs. Only available when the `fastembed-embeddings` feature is
//! enabled.

use crate::Result;
use crate::error::StorageError;
use crate::rerank::Reranker;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::OnceLock;

/// Batch size for reranker model calls.
const RERANK_BATCH_SIZE: usize = 32;

/// Process-wide singleton for the reranker model.
static RERANKER_MODEL: OnceLock<std::sync::Mutex<fastembed::TextRerank>> = OnceLock::new();

/// Cross-encoder reranker.
///
/// The model is loaded once at construction and shared process-wide, same
/// lifecycle as the embedding model: load failure at startup is fatal, and
/// nothing loads lazily inside the request path.
pub struct CrossEncoderReranker {
    /// Model name for debugging.
    model_name: &'static str,
}

impl CrossEncoderReranker {
    /// Creates the reranker, loading the model if not already loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if model initialization fails.
    pub fn new() -> Result<Self> {
        Self::get_model()?;
        Ok(Self {
            model_name: "jina-reranker-v1-turbo-en",
        })
    }

    /// Gets or initializes the reranker model (thread-safe).
    fn get_model() -> Result<&'static std::sync::Mutex<fastembed::TextRerank>> {
        if let Some(model) = RERANKER_MODEL.get() {
            return Ok(model);
        }

        let options =
            fastembed::RerankInitOptions::new(fastembed::RerankerModel::JINARerankerV1TurboEn)
                .with_show_download_progress(false);

        let model = fastembed::TextRerank::try_new(options)
            .map_err(|e| StorageError::Rerank(format!("Failed to load reranker model: {e}")))?;

        let _ = RERANKER_MODEL.set(std::sync::Mutex::new(model));

        RERANKER_MODEL.get().ok_or_else(|| {
            StorageError::Rerank("Model initialization race condition".to_string()).into()
        })
    }

    /// Returns the model name.
    #[must_use]
    pub const fn model_name(&self) -> &'static str {
        self.model_name
    }
}

impl Reranker for CrossEncoderReranker {
    fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let model = Self::get_model()?;
        let mut model = model
            .lock()
            .map_err(|e| StorageError::Rerank(format!("Failed to lock reranker model: {e}")))?;

        // Panic-guarded like the embedder: ONNX runtime failures must not
        // unwind through the retrieval pipeline.
        let result = catch_unwind(AssertUnwindSafe(|| {
            model.rerank(query, passages.to_vec(), false, Some(RERANK_BATCH_SIZE))
        }));

        let ranked = result
            .map_err(|panic_info| {
                let panic_msg = panic_info
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic_info.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                crate::Error::Storage(StorageError::Rerank(format!(
                    "ONNX runtime panic: {panic_msg}"
                )))
            })?
            .map_err(|e| {
                crate::Error::Storage(StorageError::Rerank(format!("Rerank failed: {e}")))
            })?;

        // The model returns results sorted by score; scatter back to
        // passage input order so the caller owns the sort.
        let mut scores = vec![0.0f32; passages.len()];
        for item in ranked {
            if let Some(slot) = scores.get_mut(item.index) {
                *slot = item.score;
            }
        }
        Ok(scores)
    }
}
