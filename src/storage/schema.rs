//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the metadata store.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per scraping session, keyed by name
CREATE TABLE IF NOT EXISTS sessions (
    name TEXT PRIMARY KEY,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    base_url TEXT NOT NULL,
    directory TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    stop_reason TEXT,
    attempted INTEGER NOT NULL,
    succeeded INTEGER NOT NULL,
    failed INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_started ON sessions(started_at);

-- Per-page outcomes in fetch order
CREATE TABLE IF NOT EXISTS outcomes (
    session_name TEXT NOT NULL REFERENCES sessions(name),
    seq INTEGER NOT NULL,
    page_id TEXT NOT NULL,
    url TEXT NOT NULL,
    status TEXT NOT NULL,
    http_code INTEGER,
    elapsed_seconds REAL NOT NULL,
    retries INTEGER NOT NULL,
    bytes INTEGER,
    error_category TEXT,
    error_message TEXT,
    saved_path TEXT,
    fetched_at TEXT NOT NULL,
    PRIMARY KEY (session_name, seq)
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
