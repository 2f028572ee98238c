//! Durable fetch cache for EDGAR responses.
//!
//! A key -> JSON table per namespace, each row carrying its insertion
//! timestamp. Reads honor a TTL and report absent on expiry; filings change
//! slowly, so caching aggressively is fine. Read failures also report
//! absent - a failed read must never surface as stale data - while write
//! failures are real errors.

use crate::error::{Result, StorageError};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Default cache path relative to the working directory.
pub const DEFAULT_CACHE_PATH: &str = ".toshi/fetch-cache.db";

/// Logical cache namespaces, one table each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// Company-name lookups, keyed by normalized query.
    CompanySearch,
    /// Parsed submissions, keyed by CIK.
    CompanySubmissions,
    /// Parsed fact tables, keyed by CIK.
    CompanyFacts,
    /// Parsed filings (sectioned text), keyed by `{cik}_{accession}`.
    FilingText,
}

impl Namespace {
    /// Backing table name.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::CompanySearch => "company_search",
            Self::CompanySubmissions => "company_submissions",
            Self::CompanyFacts => "company_facts",
            Self::FilingText => "filing_text",
        }
    }

    /// Default time-to-live for rows in this namespace.
    #[must_use]
    pub const fn ttl(self) -> Duration {
        match self {
            Self::CompanySearch => Duration::from_secs(24 * 3600),
            Self::CompanySubmissions | Self::CompanyFacts => Duration::from_secs(48 * 3600),
            // Filing bodies are immutable once published
            Self::FilingText => Duration::from_secs(720 * 3600),
        }
    }

    /// All namespaces.
    const ALL: [Self; 4] = [
        Self::CompanySearch,
        Self::CompanySubmissions,
        Self::CompanyFacts,
        Self::FilingText,
    ];
}

/// SQLite-backed fetch cache.
///
/// # Examples
///
/// ```no_run
/// use toshi_rag::edgar::cache::{FetchCache, Namespace};
///
/// let mut cache = FetchCache::open(".toshi/fetch-cache.db").unwrap();
/// cache.init().unwrap();
/// cache.put(Namespace::CompanySubmissions, "0000320193", &"{}").unwrap();
/// ```
pub struct FetchCache {
    /// `SQLite` connection.
    conn: Connection,
    /// Path to the database file (None for in-memory).
    path: Option<PathBuf>,
}

impl FetchCache {
    /// Opens or creates the cache database at the given path.
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
        let _: String = conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
            .map_err(StorageError::from)?;

        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// Creates an in-memory cache. Useful for testing.
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

    /// Creates the namespace tables if they don't exist. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation fails.
    pub fn init(&mut self) -> Result<()> {
        for namespace in Namespace::ALL {
            self.conn
                .execute(
                    &format!(
                        r"
                    CREATE TABLE IF NOT EXISTS {} (
                        key TEXT PRIMARY KEY,
                        value TEXT NOT NULL,
                        inserted_at INTEGER NOT NULL
                    )",
                        namespace.table()
                    ),
                    [],
                )
                .map_err(StorageError::from)?;
        }
        Ok(())
    }

    /// Retrieves a cached value if present and younger than `max_age`.
    ///
    /// Any failure (query, decode) reports absent so callers refetch
    /// instead of ever acting on stale or corrupt rows.
    #[must_use]
    pub fn get<T: DeserializeOwned>(
        &self,
        namespace: Namespace,
        key: &str,
        max_age: Duration,
    ) -> Option<T> {
        let row: (String, i64) = self
            .conn
            .query_row(
                &format!(
                    "SELECT value, inserted_at FROM {} WHERE key = ?",
                    namespace.table()
                ),
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .unwrap_or_else(|e| {
                warn!(namespace = namespace.table(), key, error = %e, "cache read failed");
                None
            })?;

        let (value, inserted_at) = row;
        let age = Self::now().saturating_sub(inserted_at);
        #[allow(clippy::cast_possible_wrap)]
        if age > max_age.as_secs() as i64 {
            return None;
        }

        match serde_json::from_str(&value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(namespace = namespace.table(), key, error = %e, "cache decode failed");
                None
            }
        }
    }

    /// Upserts a value into a namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails; write failures
    /// are never swallowed.
    pub fn put<T: Serialize>(&mut self, namespace: Namespace, key: &str, value: &T) -> Result<()> {
        let encoded = serde_json::to_string(value).map_err(StorageError::from)?;
        self.conn
            .execute(
                &format!(
                    "INSERT OR REPLACE INTO {} (key, value, inserted_at) VALUES (?, ?, ?)",
                    namespace.table()
                ),
                params![key, encoded, Self::now()],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Removes all rows keyed by a company across namespaces.
    ///
    /// The search namespace is keyed by query string, not company, so it is
    /// untouched. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns an error if a delete fails.
    pub fn clear_company(&mut self, cik: &str) -> Result<usize> {
        let mut removed = 0;
        for namespace in [Namespace::CompanySubmissions, Namespace::CompanyFacts] {
            removed += self
                .conn
                .execute(
                    &format!("DELETE FROM {} WHERE key = ?", namespace.table()),
                    params![cik],
                )
                .map_err(StorageError::from)?;
        }
        // Filing keys are `{cik}_{accession}`; prefix-match the cik exactly
        // (LIKE would treat `_` in the cik as a wildcard)
        let prefix = format!("{cik}_");
        #[allow(clippy::cast_possible_wrap)]
        let prefix_len = prefix.len() as i64;
        removed += self
            .conn
            .execute(
                "DELETE FROM filing_text WHERE substr(key, 1, ?) = ?",
                params![prefix_len, prefix],
            )
            .map_err(StorageError::from)?;
        Ok(removed)
    }

    /// Returns current Unix timestamp.
    #[allow(clippy::cast_possible_wrap)]
    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    /// Backdates a row's insertion timestamp. Test hook for TTL behavior.
    #[cfg(test)]
    fn backdate(&self, namespace: Namespace, key: &str, seconds: i64) {
        self.conn
            .execute(
                &format!(
                    "UPDATE {} SET inserted_at = inserted_at - ? WHERE key = ?",
                    namespace.table()
                ),
                params![seconds, key],
            )
            .unwrap();
    }
}
