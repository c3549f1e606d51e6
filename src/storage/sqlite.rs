//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the MetadataStore trait.

use crate::session::{ErrorCategory, FetchOutcome, FetchStatus, SessionRecord, StopReason};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{MetadataStore, StorageError, StorageResult};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the metadata store inside the save root
pub const METADATA_FILE: &str = "scraping_metadata.db";

/// How long a second writer waits for the database lock before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

/// Raw session header row, before string columns are decoded
struct SessionRow {
    name: String,
    started_at: String,
    finished_at: Option<String>,
    base_url: String,
    directory: String,
    config_hash: String,
    stop_reason: Option<String>,
}

/// Raw outcome row, before string columns are decoded
struct OutcomeRow {
    page_id: String,
    url: String,
    status: String,
    http_code: Option<u16>,
    elapsed_seconds: f64,
    retries: u32,
    bytes: Option<i64>,
    error_category: Option<String>,
    error_message: Option<String>,
    saved_path: Option<String>,
    fetched_at: String,
}

impl SqliteStorage {
    /// Opens (creating if needed) the database file at `path`
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Opens the metadata store for a save root, creating the root if needed
    pub fn open_in(save_path: &Path) -> StorageResult<Self> {
        std::fs::create_dir_all(save_path)?;
        Self::new(&save_path.join(METADATA_FILE))
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn load_outcomes(&self, session_name: &str) -> StorageResult<Vec<FetchOutcome>> {
        let mut stmt = self.conn.prepare(
            "SELECT page_id, url, status, http_code, elapsed_seconds, retries, bytes,
             error_category, error_message, saved_path, fetched_at
             FROM outcomes WHERE session_name = ?1 ORDER BY seq",
        )?;

        let rows = stmt
            .query_map(params![session_name], |row| {
                Ok(OutcomeRow {
                    page_id: row.get(0)?,
                    url: row.get(1)?,
                    status: row.get(2)?,
                    http_code: row.get(3)?,
                    elapsed_seconds: row.get(4)?,
                    retries: row.get(5)?,
                    bytes: row.get(6)?,
                    error_category: row.get(7)?,
                    error_message: row.get(8)?,
                    saved_path: row.get(9)?,
                    fetched_at: row.get(10)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(decode_outcome).collect()
    }

    fn restore_session(&self, row: SessionRow) -> StorageResult<SessionRecord> {
        let outcomes = self.load_outcomes(&row.name)?;

        let mut header = SessionRecord::new(
            &row.name,
            &row.base_url,
            PathBuf::from(&row.directory),
            &row.config_hash,
        );
        header.started_at = parse_timestamp(&row.started_at)?;
        header.finished_at = row.finished_at.as_deref().map(parse_timestamp).transpose()?;
        header.stop_reason = row
            .stop_reason
            .as_deref()
            .map(|s| {
                StopReason::from_db_string(s)
                    .ok_or_else(|| StorageError::Corrupt(format!("unknown stop reason '{}'", s)))
            })
            .transpose()?;

        Ok(SessionRecord::restore(header, outcomes))
    }
}

impl MetadataStore for SqliteStorage {
    fn save_session(&mut self, record: &SessionRecord) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        // Replace only this session's rows; every other session is left alone
        tx.execute(
            "DELETE FROM outcomes WHERE session_name = ?1",
            params![record.name],
        )?;
        tx.execute("DELETE FROM sessions WHERE name = ?1", params![record.name])?;

        tx.execute(
            "INSERT INTO sessions (name, started_at, finished_at, base_url, directory,
             config_hash, stop_reason, attempted, succeeded, failed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.name,
                format_timestamp(&record.started_at),
                record.finished_at.as_ref().map(format_timestamp),
                record.base_url,
                record.directory.to_string_lossy().into_owned(),
                record.config_hash,
                record.stop_reason.map(|r| r.to_db_string()),
                record.attempted() as i64,
                record.succeeded() as i64,
                record.failed() as i64,
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO outcomes (session_name, seq, page_id, url, status, http_code,
                 elapsed_seconds, retries, bytes, error_category, error_message, saved_path,
                 fetched_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;

            for (seq, outcome) in record.outcomes().iter().enumerate() {
                stmt.execute(params![
                    record.name,
                    seq as i64,
                    outcome.page_id,
                    outcome.url,
                    outcome.status.to_db_string(),
                    outcome.http_code,
                    outcome.elapsed.as_secs_f64(),
                    outcome.retries,
                    outcome.bytes.map(|b| b as i64),
                    outcome.error_category.map(|c| c.to_db_string()),
                    outcome.error_message,
                    outcome
                        .saved_path
                        .as_ref()
                        .map(|p| p.to_string_lossy().into_owned()),
                    format_timestamp(&outcome.fetched_at),
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn load_sessions(&self) -> StorageResult<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, started_at, finished_at, base_url, directory, config_hash, stop_reason
             FROM sessions ORDER BY started_at, name",
        )?;

        let rows = stmt
            .query_map([], session_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|row| self.restore_session(row))
            .collect()
    }

    fn get_session(&self, name: &str) -> StorageResult<Option<SessionRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT name, started_at, finished_at, base_url, directory, config_hash, stop_reason
                 FROM sessions WHERE name = ?1",
                params![name],
                session_row,
            )
            .optional()?;

        row.map(|row| self.restore_session(row)).transpose()
    }

    fn count_sessions(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        name: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        base_url: row.get(3)?,
        directory: row.get(4)?,
        config_hash: row.get(5)?,
        stop_reason: row.get(6)?,
    })
}

fn decode_outcome(row: OutcomeRow) -> StorageResult<FetchOutcome> {
    let status = FetchStatus::from_db_string(&row.status)
        .ok_or_else(|| StorageError::Corrupt(format!("unknown status '{}'", row.status)))?;

    let error_category = row
        .error_category
        .as_deref()
        .map(|s| {
            ErrorCategory::from_db_string(s)
                .ok_or_else(|| StorageError::Corrupt(format!("unknown error category '{}'", s)))
        })
        .transpose()?;

    if !row.elapsed_seconds.is_finite() || row.elapsed_seconds < 0.0 {
        return Err(StorageError::Corrupt(format!(
            "invalid elapsed time {} for page {}",
            row.elapsed_seconds, row.page_id
        )));
    }

    Ok(FetchOutcome {
        page_id: row.page_id,
        url: row.url,
        status,
        http_code: row.http_code,
        elapsed: Duration::from_secs_f64(row.elapsed_seconds),
        retries: row.retries,
        bytes: row.bytes.map(|b| b.max(0) as u64),
        error_category,
        error_message: row.error_message,
        saved_path: row.saved_path.map(PathBuf::from),
        fetched_at: parse_timestamp(&row.fetched_at)?,
    })
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("bad timestamp '{}': {}", s, e)))
}
