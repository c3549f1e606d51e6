//! Page content sink
//!
//! Pages are written to a temporary file inside the session directory and then
//! renamed into place, so a half-written page never sits under its final name.

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::Builder;
use thiserror::Error;

/// Errors raised while saving page content
#[derive(Debug, Error)]
pub enum PageStoreError {
    /// The session directory cannot be created; nothing more can be saved
    #[error("Cannot create session directory {path}: {source}")]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The directory is usable but this file could not be written
    #[error("Cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid filename '{0}'")]
    InvalidFilename(String),
}

impl PageStoreError {
    /// True when the session directory itself is unusable
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Directory { .. })
    }
}

/// Writes fetched pages under `<root>/<session>/<filename>`
#[derive(Debug, Clone)]
pub struct PageStore {
    root: PathBuf,
}

impl PageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the pages of one session
    pub fn session_dir(&self, session_name: &str) -> PathBuf {
        self.root.join(session_name)
    }

    /// Creates the session directory if it does not already exist
    pub fn ensure_dir(&self, session_dir: &Path) -> Result<(), PageStoreError> {
        std::fs::create_dir_all(session_dir).map_err(|source| PageStoreError::Directory {
            path: session_dir.to_path_buf(),
            source,
        })
    }

    /// Saves `content` as `filename` inside `session_dir`
    ///
    /// # Returns
    ///
    /// * `Ok(PathBuf)` - Final path of the saved page
    /// * `Err(PageStoreError)` - Directory, write, or rename failure
    pub fn save(
        &self,
        content: &[u8],
        session_dir: &Path,
        filename: &str,
    ) -> Result<PathBuf, PageStoreError> {
        validate_filename(filename)?;
        self.ensure_dir(session_dir)?;

        let target = session_dir.join(filename);
        let write_err = |source: std::io::Error| PageStoreError::Write {
            path: target.clone(),
            source,
        };

        // Dropping the temp file on any error path removes it
        let mut tmp = Builder::new()
            .prefix(".partial-")
            .tempfile_in(session_dir)
            .map_err(write_err)?;
        tmp.write_all(content).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&target).map_err(|e| write_err(e.error))?;

        tracing::debug!("Saved {} bytes to {}", content.len(), target.display());
        Ok(target)
    }
}

fn validate_filename(filename: &str) -> Result<(), PageStoreError> {
    let bad = filename.is_empty()
        || filename == "."
        || filename == ".."
        || filename.contains('/')
        || filename.contains('\\');

    if bad {
        return Err(PageStoreError::InvalidFilename(filename.to_string()));
    }
    Ok(())
}
