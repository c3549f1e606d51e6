//! Download status report
//!
//! Reads the save root directly, so it also shows sessions whose metadata was
//! never persisted (for example after a crash mid-session).

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// How many recent files to list per session directory
const RECENT_FILES: usize = 5;

/// Saved files in one session directory
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDirStatus {
    pub name: String,
    pub path: PathBuf,
    pub file_count: usize,
    /// Most recently modified file names, newest first
    pub recent: Vec<String>,
}

/// Lists every session directory under `save_path`
///
/// A missing save root is reported as having no sessions. Temporary
/// `.partial-` files are not counted.
pub fn scan_downloads(save_path: &Path) -> std::io::Result<Vec<SessionDirStatus>> {
    if !save_path.exists() {
        return Ok(Vec::new());
    }

    let mut sessions = Vec::new();
    for entry in std::fs::read_dir(save_path)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        sessions.push(scan_session_dir(&entry.path())?);
    }

    sessions.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(sessions)
}

fn scan_session_dir(dir: &Path) -> std::io::Result<SessionDirStatus> {
    let mut files: Vec<(SystemTime, String)> = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(".partial-") || !entry.file_type()?.is_file() {
            continue;
        }
        let modified = entry
            .metadata()?
            .modified()
            .unwrap_or(SystemTime::UNIX_EPOCH);
        files.push((modified, name));
    }

    files.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    Ok(SessionDirStatus {
        name: dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        path: dir.to_path_buf(),
        file_count: files.len(),
        recent: files
            .into_iter()
            .take(RECENT_FILES)
            .map(|(_, name)| name)
            .collect(),
    })
}

/// Prints the status report to stdout
pub fn print_status(save_path: &Path, sessions: &[SessionDirStatus]) {
    println!("=== Download Status ===\n");
    println!("Save path: {}\n", save_path.display());

    if sessions.is_empty() {
        println!("No session directories found.");
        return;
    }

    for session in sessions {
        println!("{}: {} files", session.name, session.file_count);
        for name in &session.recent {
            println!("  - {}", name);
        }
    }
}
