//! CSV export of every recorded page outcome
//!
//! One row per page, sessions ordered by start time then name, rows in fetch
//! order. The output depends only on the metadata store contents, so exporting
//! twice without new sessions gives identical bytes.

use crate::session::{FetchOutcome, SessionRecord};
use crate::storage::MetadataStore;
use crate::{HarvestError, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// One exported CSV row
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    session: &'a str,
    page_identifier: &'a str,
    status: &'static str,
    http_code: Option<u16>,
    elapsed_seconds: String,
    retries: u32,
    saved_path: String,
    error_category: &'static str,
}

impl<'a> ExportRow<'a> {
    fn new(session: &'a SessionRecord, outcome: &'a FetchOutcome) -> Self {
        Self {
            session: &session.name,
            page_identifier: &outcome.page_id,
            status: outcome.status.to_db_string(),
            http_code: outcome.http_code,
            elapsed_seconds: format!("{:.3}", outcome.elapsed.as_secs_f64()),
            retries: outcome.retries,
            saved_path: outcome
                .saved_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            error_category: outcome
                .error_category
                .map(|c| c.to_db_string())
                .unwrap_or(""),
        }
    }
}

/// Flattens the metadata store into a CSV summary
pub struct MetadataExporter<'a, S: MetadataStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: MetadataStore + ?Sized> MetadataExporter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Renders the CSV document in memory
    pub fn render(&self) -> Result<Vec<u8>> {
        let sessions = self.store.load_sessions()?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        let mut rows = 0usize;
        for session in &sessions {
            for outcome in session.outcomes() {
                writer.serialize(ExportRow::new(session, outcome))?;
                rows += 1;
            }
        }

        // serialize only emits the header with the first row
        if rows == 0 {
            writer.write_record([
                "session",
                "page_identifier",
                "status",
                "http_code",
                "elapsed_seconds",
                "retries",
                "saved_path",
                "error_category",
            ])?;
        }

        writer
            .into_inner()
            .map_err(|e| HarvestError::Io(e.into_error()))
    }

    /// Writes the CSV to `destination`, replacing any previous export
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of bytes written
    /// * `Err(HarvestError)` - Store read or file write failed
    pub fn export_csv(&self, destination: &Path) -> Result<usize> {
        let content = self.render()?;

        let parent = match destination.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(&content)?;
        tmp.as_file().sync_all()?;
        tmp.persist(destination).map_err(|e| e.error)?;

        tracing::info!("Exported metadata to {}", destination.display());
        Ok(content.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{test_outcome, FetchStatus, StopReason};
    use crate::storage::SqliteStorage;

    fn store_with_session() -> SqliteStorage {
        let mut store = SqliteStorage::new_in_memory().unwrap();
        let mut record = SessionRecord::new("s", "https://example.test/p", "out/s".into(), "h");
        record.push(test_outcome("1", FetchStatus::Success));
        record.push(test_outcome("2", FetchStatus::Failure));
        record.finalize(StopReason::Completed);
        store.save_session(&record).unwrap();
        store
    }

    #[test]
    fn test_render_rows() {
        let store = store_with_session();
        let csv = String::from_utf8(MetadataExporter::new(&store).render().unwrap()).unwrap();
        let lines: Vec<_> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "session,page_identifier,status,http_code,elapsed_seconds,retries,saved_path,error_category"
        );
        assert_eq!(lines[1], "s,1,success,200,0.120,0,out/s/page_1.html,");
        assert_eq!(lines[2], "s,2,failure,500,0.120,2,,retryable_http_error");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_empty_store_has_header_only() {
        let store = SqliteStorage::new_in_memory().unwrap();
        let csv = String::from_utf8(MetadataExporter::new(&store).render().unwrap()).unwrap();
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.starts_with("session,page_identifier"));
    }

    #[test]
    fn test_export_is_idempotent() {
        let store = store_with_session();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("summary.csv");
        let exporter = MetadataExporter::new(&store);

        exporter.export_csv(&dest).unwrap();
        let first = std::fs::read(&dest).unwrap();
        exporter.export_csv(&dest).unwrap();
        let second = std::fs::read(&dest).unwrap();

        assert_eq!(first, second);
    }
}
