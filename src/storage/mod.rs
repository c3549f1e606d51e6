//! Storage module for persisting scraped pages and session metadata
//!
//! This module handles:
//! - Writing page content under per-session directories
//! - The SQLite metadata store holding every finalized session
//! - Session-granular merges so earlier sessions are never lost

mod page_store;
mod schema;
mod sqlite;
mod traits;

pub use page_store::{PageStore, PageStoreError};
pub use sqlite::{SqliteStorage, METADATA_FILE};
pub use traits::{MetadataStore, StorageError, StorageResult};

use std::path::Path;

/// Opens the metadata store that lives under a save root
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully opened store
/// * `Err(StorageError)` - The root could not be created or the database opened
pub fn open_storage(save_path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::open_in(save_path)
}
