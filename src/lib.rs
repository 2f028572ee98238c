//! # toshi-rag
//!
//! Retrieval core for SEC filing Q&A.
//!
//! Answers natural-language questions about a public company by retrieving
//! cited passages from its regulatory filings. Filings are ingested on
//! demand (fetch, section extraction, word-window chunking, embedding) into
//! a persistent vector index; each query then runs a four-stage retrieval:
//! offline HyDE expansion, maximal-marginal-relevance candidate selection,
//! corrective self-critique filtering, and cross-encoder reranking.
//!
//! ## Features
//!
//! - **On-demand ingestion**: deterministic chunk ids make re-ingestion
//!   idempotent
//! - **Persistent stores**: `SQLite` fetch cache and vector index
//! - **Local models**: fastembed embeddings and reranker, no external API
//! - **Cited results**: every passage carries full filing provenance

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod cli;
pub mod edgar;
pub mod embedding;
pub mod error;
pub mod filing;
pub mod index;
pub mod pipeline;
pub mod rerank;
pub mod retrieval;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export core domain types
pub use filing::{Citation, Filing, FilingChunk, SectionId};

// Re-export pipeline types
pub use pipeline::{FilingPipeline, SearchRequest};

// Re-export store types
pub use edgar::{EdgarClient, FetchCache, FilingSource};
pub use index::{DEFAULT_INDEX_PATH, SqliteIndex, VectorIndex};

// Re-export embedding types
#[cfg(feature = "fastembed-embeddings")]
pub use embedding::FastEmbedEmbedder;
pub use embedding::{DIMENSIONS, Embedder, HashEmbedder, cosine_similarity, create_embedder};

// Re-export rerank types
#[cfg(feature = "fastembed-embeddings")]
pub use rerank::CrossEncoderReranker;
pub use rerank::{LexicalReranker, Reranker, create_reranker};

// Re-export retrieval types
pub use retrieval::{Retriever, TOP_K};

// Re-export CLI types
pub use cli::{Cli, Commands, OutputFormat};
