//! Database schema for the vector index.

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Table holding indexed filing chunks.
pub const COLLECTION_NAME: &str = "toshi_filings";

/// SQL schema for initial index setup.
pub const SCHEMA_SQL: &str = r"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_info (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Indexed filing chunks: one row per chunk, embedding as f32 LE bytes.
-- chunk_id is deterministic ({cik}_{year}_{section}_{index}) so duplicate
-- inserts are no-ops.
CREATE TABLE IF NOT EXISTS toshi_filings (
    chunk_id TEXT PRIMARY KEY,
    embedding BLOB NOT NULL,
    dimensions INTEGER NOT NULL,
    text TEXT NOT NULL,
    company TEXT NOT NULL DEFAULT '',
    cik TEXT NOT NULL,
    year TEXT NOT NULL,
    quarter TEXT,
    filing_type TEXT NOT NULL DEFAULT '10-K',
    section TEXT NOT NULL,
    parent_section TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL
);

-- Filtered queries always constrain by company, usually by year too
CREATE INDEX IF NOT EXISTS idx_filings_cik ON toshi_filings(cik);
CREATE INDEX IF NOT EXISTS idx_filings_cik_year ON toshi_filings(cik, year);
";

/// SQL to check if the schema is initialized.
pub const CHECK_SCHEMA_SQL: &str = r"
SELECT COUNT(*) FROM sqlite_master
WHERE type='table' AND name='schema_info';
";

/// SQL to get the schema version.
pub const GET_VERSION_SQL: &str = r"
SELECT value FROM schema_info WHERE key = 'version';
";

/// SQL to set the schema version.
pub const SET_VERSION_SQL: &str = r"
INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?);
";
