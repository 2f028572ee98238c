//! Persistent vector index for filing chunks.
//!
//! Stores `(chunk_id, embedding, text, metadata)` rows and answers filtered
//! similarity queries. Chunk ids are deterministic, so re-ingestion is
//! idempotent: duplicate inserts are no-ops.

pub mod schema;
pub mod sqlite;

pub use schema::{COLLECTION_NAME, CURRENT_SCHEMA_VERSION, SCHEMA_SQL};
pub use sqlite::SqliteIndex;

use crate::Result;
use crate::filing::FilingChunk;

/// Default index path relative to the working directory.
pub const DEFAULT_INDEX_PATH: &str = ".toshi/filing-index.db";

/// Maximum rows per insert batch, to bound memory.
pub const ADD_BATCH_SIZE: usize = 100;

/// A conjunction of metadata equality predicates.
///
/// `cik` is effectively always set - queries never mix companies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexFilter {
    /// 10-digit zero-padded company identifier.
    pub cik: Option<String>,
    /// Four-digit fiscal year.
    pub year: Option<String>,
    /// Quarter tag (`QTR1`..`QTR4`).
    pub quarter: Option<String>,
    /// Filing type, e.g. "10-K".
    pub filing_type: Option<String>,
}

impl IndexFilter {
    /// Filter restricted to a single company.
    #[must_use]
    pub fn company(cik: &str) -> Self {
        Self {
            cik: Some(cik.to_string()),
            ..Self::default()
        }
    }

    /// Adds a year predicate.
    #[must_use]
    pub fn with_year(mut self, year: &str) -> Self {
        self.year = Some(year.to_string());
        self
    }

    /// Adds a quarter predicate.
    #[must_use]
    pub fn with_quarter(mut self, quarter: &str) -> Self {
        self.quarter = Some(quarter.to_string());
        self
    }

    /// Adds a filing-type predicate.
    #[must_use]
    pub fn with_filing_type(mut self, filing_type: &str) -> Self {
        self.filing_type = Some(filing_type.to_string());
        self
    }
}

/// A query hit: the stored chunk, its stored embedding, and the similarity
/// to the query vector.
///
/// The embedding is returned so the MMR stage can compute diversity without
/// re-embedding; it never leaves the retriever.
#[derive(Debug, Clone)]
pub struct IndexMatch {
    /// The stored chunk with full provenance.
    pub chunk: FilingChunk,
    /// The stored embedding.
    pub embedding: Vec<f32>,
    /// Cosine similarity (dot product of unit-norm vectors) to the query.
    pub similarity: f32,
}

/// Trait for persistent vector index backends.
pub trait VectorIndex: Send + Sync {
    /// Initializes the index (creates schema, runs migrations).
    ///
    /// Idempotent - safe to call multiple times.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation fails.
    fn init(&mut self) -> Result<()>;

    /// Checks whether a chunk id is already stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn exists(&self, chunk_id: &str) -> Result<bool>;

    /// Inserts chunks with their embeddings, skipping ids already present.
    ///
    /// Insertion is internally batched ([`ADD_BATCH_SIZE`] rows at a time).
    /// Returns the number of rows actually inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk and embedding counts differ or a write
    /// fails. Write failures are never swallowed.
    fn add(&mut self, chunks: &[FilingChunk], embeddings: &[Vec<f32>]) -> Result<usize>;

    /// Returns the top-k stored entries by similarity among rows satisfying
    /// the filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn query(&self, embedding: &[f32], filter: &IndexFilter, k: usize) -> Result<Vec<IndexMatch>>;

    /// Removes all entries for a company. The only deletion path.
    ///
    /// Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn clear_company(&mut self, cik: &str) -> Result<usize>;

    /// Returns the total number of stored chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    fn count(&self) -> Result<usize>;
}
