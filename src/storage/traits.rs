//! Storage traits and error types
//!
//! This module defines the trait interface for metadata store backends and
//! associated error types.

use crate::session::SessionRecord;
use thiserror::Error;

/// Errors that can occur during metadata store operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Corrupt metadata: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable record of every finalized session
///
/// The store is the single source of truth for statistics and exports. Writes
/// merge at session granularity: saving a session never disturbs the rows of
/// any other session.
pub trait MetadataStore {
    /// Inserts a session, or replaces the session with the same name
    ///
    /// The session header and its outcome rows are written atomically.
    fn save_session(&mut self, record: &SessionRecord) -> StorageResult<()>;

    /// Loads every stored session, ordered by start time then name
    fn load_sessions(&self) -> StorageResult<Vec<SessionRecord>>;

    /// Loads a single session by name
    fn get_session(&self, name: &str) -> StorageResult<Option<SessionRecord>>;

    /// Counts stored sessions
    fn count_sessions(&self) -> StorageResult<u64>;
}
