//! Error types for the filing retrieval core.
//!
//! This module provides the error hierarchy using `thiserror` for all
//! operations: EDGAR fetches, cache and index storage, ingestion, and CLI
//! commands.

use thiserror::Error;

/// Result type alias for retrieval-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for retrieval-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// EDGAR client errors (HTTP communication).
    #[error("edgar error: {0}")]
    Edgar(#[from] EdgarError),

    /// Storage errors (fetch cache and vector index).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Ingestion errors (a single filing failed to ingest).
    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// CLI command errors.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

impl Error {
    /// Whether this error is scoped to a single filing.
    ///
    /// The ingestion loop logs and skips filing-local failures (a fetch that
    /// timed out, a document that could not be sectioned) but aborts when the
    /// index itself is unavailable.
    #[must_use]
    pub const fn is_filing_local(&self) -> bool {
        matches!(self, Self::Edgar(_) | Self::Ingest(_))
    }
}

/// Errors from the EDGAR REST client.
#[derive(Error, Debug)]
pub enum EdgarError {
    /// Transport-level HTTP failure (connect, timeout, TLS).
    #[error("http error: {0}")]
    Http(String),

    /// Non-success HTTP status from EDGAR.
    #[error("unexpected status {status} from {url}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Request URL.
        url: String,
    },

    /// Response body could not be decoded as the expected JSON shape.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Errors from the fetch cache and vector index.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Embedding model error.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Cross-encoder reranker error.
    #[error("rerank error: {0}")]
    Rerank(String),
}

/// Errors scoped to the ingestion of a single filing.
#[derive(Error, Debug)]
pub enum IngestError {
    /// No filings of the requested type were listed for the company.
    #[error("no {filing_type} filings found for CIK {cik}")]
    NoFilings {
        /// 10-digit zero-padded company identifier.
        cik: String,
        /// Requested filing type (e.g. "10-K").
        filing_type: String,
    },

    /// The filing document body could not be fetched.
    #[error("document unavailable for accession {accession}")]
    DocumentUnavailable {
        /// Accession number of the filing.
        accession: String,
    },
}

/// CLI command-specific errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Invalid argument provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Command execution failed.
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),

    /// Output format error.
    #[error("output format error: {0}")]
    OutputFormat(String),
}

// Implement From traits for library errors

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(StorageError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for EdgarError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Edgar(EdgarError::Http(err.to_string()))
    }
}
