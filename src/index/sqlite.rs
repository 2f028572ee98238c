//! `SQLite` vector index implementation.
//!
//! Embeddings are stored as little-endian f32 BLOBs alongside chunk text
//! and metadata. Queries load the filtered rows and rank them by dot
//! product in memory; with per-company filters and candidate sets capped at
//! a few dozen rows this stays well inside interactive latency without an
//! ANN structure.

use crate::embedding::dot;
use crate::error::{Result, StorageError};
use crate::filing::FilingChunk;
use crate::index::schema::{
    CHECK_SCHEMA_SQL, CURRENT_SCHEMA_VERSION, GET_VERSION_SQL, SCHEMA_SQL, SET_VERSION_SQL,
};
use crate::index::{ADD_BATCH_SIZE, IndexFilter, IndexMatch, VectorIndex};
use rusqlite::{Connection, OptionalExtension, ToSql, params};
use std::path::{Path, PathBuf};

/// SQLite-backed vector index.
///
/// # Examples
///
/// ```no_run
/// use toshi_rag::index::{SqliteIndex, VectorIndex};
///
/// let mut index = SqliteIndex::open(".toshi/filing-index.db").unwrap();
/// index.init().unwrap();
/// ```
pub struct SqliteIndex {
    /// `SQLite` connection.
    conn: Connection,
    /// Path to the database file (None for in-memory).
    path: Option<PathBuf>,
}

impl SqliteIndex {
    /// Opens or creates the index database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::Database(e.to_string()))?;
            }
        }

        let conn = Connection::open(&path).map_err(StorageError::from)?;

        // WAL mode for concurrent readers during ingestion
        let _: String = conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
            .map_err(StorageError::from)?;

        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// Creates an in-memory index. Useful for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        Ok(Self { conn, path: None })
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Sets the schema version.
    fn set_schema_version(&self, version: u32) -> Result<()> {
        self.conn
            .execute(SET_VERSION_SQL, params![version.to_string()])
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Returns current Unix timestamp.
    #[allow(clippy::cast_possible_wrap)]
    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

/// Serializes an embedding as little-endian f32 bytes.
fn vec_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

/// Deserializes little-endian f32 bytes back into an embedding.
fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect()
}

impl VectorIndex for SqliteIndex {
    fn init(&mut self) -> Result<()> {
        let is_init: i64 = self
            .conn
            .query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))
            .map_err(StorageError::from)?;

        if is_init == 0 {
            self.conn
                .execute_batch(SCHEMA_SQL)
                .map_err(|e| StorageError::Migration(e.to_string()))?;
            self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
        } else {
            let version: Option<String> = self
                .conn
                .query_row(GET_VERSION_SQL, [], |row| row.get(0))
                .optional()
                .map_err(StorageError::from)?;
            let version: u32 = version.and_then(|v| v.parse().ok()).unwrap_or(0);
            if version < CURRENT_SCHEMA_VERSION {
                self.conn
                    .execute_batch(SCHEMA_SQL)
                    .map_err(|e| StorageError::Migration(e.to_string()))?;
                self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
            }
        }

        Ok(())
    }

    fn exists(&self, chunk_id: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM toshi_filings WHERE chunk_id = ?",
                params![chunk_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::from)?;
        Ok(found.is_some())
    }

    fn add(&mut self, chunks: &[FilingChunk], embeddings: &[Vec<f32>]) -> Result<usize> {
        if chunks.len() != embeddings.len() {
            return Err(StorageError::Database(format!(
                "chunk/embedding count mismatch: {} vs {}",
                chunks.len(),
                embeddings.len()
            ))
            .into());
        }
        if chunks.is_empty() {
            return Ok(0);
        }

        let now = Self::now();
        let mut inserted = 0;

        // Batched inserts bound transaction memory
        for batch_start in (0..chunks.len()).step_by(ADD_BATCH_SIZE) {
            let batch_end = (batch_start + ADD_BATCH_SIZE).min(chunks.len());
            let tx = self.conn.transaction().map_err(StorageError::from)?;
            {
                let mut stmt = tx
                    .prepare(
                        r"
                    INSERT OR IGNORE INTO toshi_filings (
                        chunk_id, embedding, dimensions, text, company, cik,
                        year, quarter, filing_type, section, parent_section,
                        created_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
                    )
                    .map_err(StorageError::from)?;

                for i in batch_start..batch_end {
                    let chunk = &chunks[i];
                    let embedding = &embeddings[i];
                    #[allow(clippy::cast_possible_wrap)]
                    let changed = stmt
                        .execute(params![
                            chunk.chunk_id,
                            vec_to_blob(embedding),
                            embedding.len() as i64,
                            chunk.text,
                            chunk.company,
                            chunk.cik,
                            chunk.year,
                            chunk.quarter,
                            chunk.filing_type,
                            chunk.section,
                            chunk.parent_section,
                            now,
                        ])
                        .map_err(StorageError::from)?;
                    inserted += changed;
                }
            }
            tx.commit().map_err(StorageError::from)?;
        }

        Ok(inserted)
    }

    fn query(&self, embedding: &[f32], filter: &IndexFilter, k: usize) -> Result<Vec<IndexMatch>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        // Conjunction of equality predicates over the metadata columns
        let mut sql = String::from(
            r"
            SELECT chunk_id, embedding, text, company, cik, year, quarter,
                   filing_type, section, parent_section
            FROM toshi_filings WHERE 1=1
        ",
        );
        let mut values: Vec<&dyn ToSql> = Vec::new();
        if let Some(cik) = &filter.cik {
            sql.push_str(" AND cik = ?");
            values.push(cik);
        }
        if let Some(year) = &filter.year {
            sql.push_str(" AND year = ?");
            values.push(year);
        }
        if let Some(quarter) = &filter.quarter {
            sql.push_str(" AND quarter = ?");
            values.push(quarter);
        }
        if let Some(filing_type) = &filter.filing_type {
            sql.push_str(" AND filing_type = ?");
            values.push(filing_type);
        }

        let mut stmt = self.conn.prepare(&sql).map_err(StorageError::from)?;
        let rows = stmt
            .query_map(&values[..], |row| {
                let blob: Vec<u8> = row.get(1)?;
                Ok(IndexMatch {
                    chunk: FilingChunk {
                        chunk_id: row.get(0)?,
                        text: row.get(2)?,
                        company: row.get(3)?,
                        cik: row.get(4)?,
                        year: row.get(5)?,
                        quarter: row.get(6)?,
                        filing_type: row.get(7)?,
                        section: row.get(8)?,
                        parent_section: row.get(9)?,
                    },
                    embedding: blob_to_vec(&blob),
                    similarity: 0.0,
                })
            })
            .map_err(StorageError::from)?;

        let mut matches: Vec<IndexMatch> = rows
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;

        for entry in &mut matches {
            entry.similarity = dot(&entry.embedding, embedding);
        }
        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(k);

        Ok(matches)
    }

    fn clear_company(&mut self, cik: &str) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM toshi_filings WHERE cik = ?", params![cik])
            .map_err(StorageError::from)?;
        Ok(removed)
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM toshi_filings", [], |row| row.get(0))
            .map_err(StorageError::from)?;
        #[allow(clippy::cast_sign_loss)]
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_index() -> SqliteIndex {
        let mut index = SqliteIndex::in_memory().unwrap();
        index.init().unwrap();
        index
    }

    fn chunk(cik: &str, year: &str, section: &str, idx: usize, text: &str) -> FilingChunk {
        FilingChunk {
            chunk_id: format!("{cik}_{year}_{section}_{idx}"),
            text: text.to_string(),
            company: "Test Corp".to_string(),
            cik: cik.to_string(),
            year: year.to_string(),
            quarter: None,
            filing_type: "10-K".to_string(),
            section: section.to_string(),
            parent_section: text.to_string(),
        }
    }

    fn unit(dim: usize) -> Vec<f32> {
        let mut v = vec![0.0; 4];
        v[dim] = 1.0;
        v
    }

    #[test]
    fn test_init_idempotent() {
        let mut index = setup_index();
        index.init().unwrap();
        assert_eq!(index.count().unwrap(), 0);
    }

    #[test]
    fn test_add_and_exists() {
        let mut index = setup_index();
        let chunks = vec![chunk("0000320193", "2024", "risk_factors", 0, "risks")];
        let inserted = index.add(&chunks, &[unit(0)]).unwrap();
        assert_eq!(inserted, 1);
        assert!(index.exists("0000320193_2024_risk_factors_0").unwrap());
        assert!(!index.exists("0000320193_2023_risk_factors_0").unwrap());
    }

    #[test]
    fn test_add_idempotent() {
        let mut index = setup_index();
        let chunks = vec![
            chunk("0000320193", "2024", "risk_factors", 0, "risks"),
            chunk("0000320193", "2024", "risk_factors", 1, "more risks"),
        ];
        let embeddings = vec![unit(0), unit(1)];

        assert_eq!(index.add(&chunks, &embeddings).unwrap(), 2);
        assert_eq!(index.count().unwrap(), 2);

        // Duplicate ids are a no-op
        assert_eq!(index.add(&chunks, &embeddings).unwrap(), 0);
        assert_eq!(index.count().unwrap(), 2);
    }

    #[test]
    fn test_add_count_mismatch() {
        let mut index = setup_index();
        let chunks = vec![chunk("0000320193", "2024", "risk_factors", 0, "risks")];
        let result = index.add(&chunks, &[]);
        assert!(result.is_err());
    }

    #[test]
    fn test_query_ranks_by_similarity() {
        let mut index = setup_index();
        let chunks = vec![
            chunk("0000320193", "2024", "risk_factors", 0, "a"),
            chunk("0000320193", "2024", "risk_factors", 1, "b"),
            chunk("0000320193", "2024", "risk_factors", 2, "c"),
        ];
        let embeddings = vec![
            vec![1.0, 0.0, 0.0, 0.0],
            vec![0.8, 0.6, 0.0, 0.0],
            vec![0.0, 1.0, 0.0, 0.0],
        ];
        index.add(&chunks, &embeddings).unwrap();

        let query = vec![1.0, 0.0, 0.0, 0.0];
        let matches = index
            .query(&query, &IndexFilter::company("0000320193"), 3)
            .unwrap();
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].chunk.chunk_id, "0000320193_2024_risk_factors_0");
        assert!((matches[0].similarity - 1.0).abs() < 1e-6);
        assert_eq!(matches[1].chunk.chunk_id, "0000320193_2024_risk_factors_1");
        assert!(matches[0].similarity >= matches[1].similarity);
        assert!(matches[1].similarity >= matches[2].similarity);
    }

    #[test]
    fn test_query_returns_stored_vector_and_text() {
        let mut index = setup_index();
        let chunks = vec![chunk("0000320193", "2024", "mda", 0, "liquidity discussion")];
        index.add(&chunks, &[vec![0.6, 0.8, 0.0, 0.0]]).unwrap();

        let matches = index
            .query(&[1.0, 0.0, 0.0, 0.0], &IndexFilter::company("0000320193"), 1)
            .unwrap();
        assert_eq!(matches[0].chunk.text, "liquidity discussion");
        assert_eq!(matches[0].embedding, vec![0.6, 0.8, 0.0, 0.0]);
    }

    #[test]
    fn test_query_truncates_to_k() {
        let mut index = setup_index();
        let chunks: Vec<FilingChunk> = (0..10)
            .map(|i| chunk("0000320193", "2024", "risk_factors", i, "text"))
            .collect();
        let embeddings: Vec<Vec<f32>> = (0..10).map(|i| unit(i % 4)).collect();
        index.add(&chunks, &embeddings).unwrap();

        let matches = index
            .query(&unit(0), &IndexFilter::company("0000320193"), 3)
            .unwrap();
        assert_eq!(matches.len(), 3);
    }

    #[test]
    fn test_filter_isolation_between_companies() {
        let mut index = setup_index();
        let chunks = vec![
            chunk("0000320193", "2024", "risk_factors", 0, "apple risks"),
            chunk("0000789019", "2024", "risk_factors", 0, "microsoft risks"),
        ];
        index.add(&chunks, &[unit(0), unit(0)]).unwrap();

        let matches = index
            .query(&unit(0), &IndexFilter::company("0000320193"), 10)
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert!(matches.iter().all(|m| m.chunk.cik == "0000320193"));
    }

    #[test]
    fn test_filter_by_year_and_type() {
        let mut index = setup_index();
        let mut q_chunk = chunk("0000320193", "2024", "risk_factors", 5, "quarterly");
        q_chunk.filing_type = "10-Q".to_string();
        q_chunk.quarter = Some("QTR2".to_string());
        let chunks = vec![
            chunk("0000320193", "2024", "risk_factors", 0, "annual"),
            chunk("0000320193", "2023", "risk_factors", 0, "older"),
            q_chunk,
        ];
        index.add(&chunks, &[unit(0), unit(0), unit(0)]).unwrap();

        let by_year = index
            .query(
                &unit(0),
                &IndexFilter::company("0000320193").with_year("2024"),
                10,
            )
            .unwrap();
        assert_eq!(by_year.len(), 2);

        let by_type = index
            .query(
                &unit(0),
                &IndexFilter::company("0000320193")
                    .with_year("2024")
                    .with_filing_type("10-Q")
                    .with_quarter("QTR2"),
                10,
            )
            .unwrap();
        assert_eq!(by_type.len(), 1);
        assert_eq!(by_type[0].chunk.text, "quarterly");
    }

    #[test]
    fn test_clear_company() {
        let mut index = setup_index();
        let chunks = vec![
            chunk("0000320193", "2024", "risk_factors", 0, "apple"),
            chunk("0000789019", "2024", "risk_factors", 0, "microsoft"),
        ];
        index.add(&chunks, &[unit(0), unit(1)]).unwrap();

        let removed = index.clear_company("0000320193").unwrap();
        assert_eq!(removed, 1);
        assert_eq!(index.count().unwrap(), 1);
        assert!(!index.exists("0000320193_2024_risk_factors_0").unwrap());
        assert!(index.exists("0000789019_2024_risk_factors_0").unwrap());
    }

    #[test]
    fn test_add_batches_over_limit() {
        let mut index = setup_index();
        let n = ADD_BATCH_SIZE * 2 + 7;
        let chunks: Vec<FilingChunk> = (0..n)
            .map(|i| chunk("0000320193", "2024", "risk_factors", i, "text"))
            .collect();
        let embeddings: Vec<Vec<f32>> = (0..n).map(|i| unit(i % 4)).collect();

        assert_eq!(index.add(&chunks, &embeddings).unwrap(), n);
        assert_eq!(index.count().unwrap(), n);
    }

    #[test]
    fn test_query_zero_k() {
        let index = setup_index();
        let matches = index
            .query(&unit(0), &IndexFilter::company("0000320193"), 0)
            .unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_blob_roundtrip() {
        let original = vec![0.25f32, -1.5, 3.75, 0.0];
        assert_eq!(blob_to_vec(&vec_to_blob(&original)), original);
    }
}
