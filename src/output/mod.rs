//! Output module for reporting on recorded sessions
//!
//! This module handles:
//! - Aggregate statistics folded from the metadata store
//! - CSV export of every page outcome
//! - A filesystem report of downloaded pages per session

mod csv_export;
pub mod stats;
mod status;

pub use csv_export::MetadataExporter;
pub use stats::{load_statistics, print_statistics, AggregateStats};
pub use status::{print_status, scan_downloads, SessionDirStatus};
