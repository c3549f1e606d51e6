//! Session and outcome records
//!
//! A `SessionRecord` is the append-only log of one scraping run. Each page
//! fetched during the run contributes exactly one `FetchOutcome`, in fetch
//! order, and the derived counts are fixed once the session is finalized.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Whether a page ended up saved on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchStatus {
    Success,
    Failure,
}

impl FetchStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "failure" => Some(Self::Failure),
            _ => None,
        }
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Why a page failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection failure or timeout
    NetworkError,

    /// Terminal non-2xx status that is never retried
    HttpError,

    /// Server error or rate limit that outlasted the retry budget
    RetryableHttpError,

    /// Body was empty or shorter than the configured minimum
    ContentError,

    /// Page was fetched but could not be written to disk
    StorageError,
}

impl ErrorCategory {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::NetworkError => "network_error",
            Self::HttpError => "http_error",
            Self::RetryableHttpError => "retryable_http_error",
            Self::ContentError => "content_error",
            Self::StorageError => "storage_error",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "network_error" => Some(Self::NetworkError),
            "http_error" => Some(Self::HttpError),
            "retryable_http_error" => Some(Self::RetryableHttpError),
            "content_error" => Some(Self::ContentError),
            "storage_error" => Some(Self::StorageError),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Why a session stopped issuing requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every requested page was attempted
    Completed,

    /// The consecutive-failure threshold was reached
    ConsecutiveFailures,

    /// The session directory became unusable
    StorageFailure,
}

impl StopReason {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::ConsecutiveFailures => "consecutive_failures",
            Self::StorageFailure => "storage_failure",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "consecutive_failures" => Some(Self::ConsecutiveFailures),
            "storage_failure" => Some(Self::StorageFailure),
            _ => None,
        }
    }
}

/// Lifecycle of a session: idle -> running -> finalized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Running,
    Finalized,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Finalized => "finalized",
        };
        f.write_str(s)
    }
}

/// Result of fetching (and, on success, saving) one page
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    /// Page number in sequential mode, parameter-set index otherwise
    pub page_id: String,

    /// Fully constructed URL that was requested
    pub url: String,

    pub status: FetchStatus,

    /// Last HTTP status observed, if any response arrived
    pub http_code: Option<u16>,

    /// Wall time for the fetch including retries and retry delays
    pub elapsed: Duration,

    /// Retry attempts consumed after the first attempt
    pub retries: u32,

    /// Body size in bytes (success only)
    pub bytes: Option<u64>,

    pub error_category: Option<ErrorCategory>,

    pub error_message: Option<String>,

    /// Where the page was written (success only)
    pub saved_path: Option<PathBuf>,

    pub fetched_at: DateTime<Utc>,
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }
}

/// One scraping run and its ordered outcome log
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub base_url: String,
    pub directory: PathBuf,
    pub config_hash: String,
    pub stop_reason: Option<StopReason>,
    outcomes: Vec<FetchOutcome>,
    attempted: u64,
    succeeded: u64,
    failed: u64,
}

impl SessionRecord {
    /// Opens a new, empty session record stamped with the current time
    pub fn new(name: &str, base_url: &str, directory: PathBuf, config_hash: &str) -> Self {
        Self {
            name: name.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            base_url: base_url.to_string(),
            directory,
            config_hash: config_hash.to_string(),
            stop_reason: None,
            outcomes: Vec::new(),
            attempted: 0,
            succeeded: 0,
            failed: 0,
        }
    }

    /// Rebuilds a finalized record loaded from the metadata store
    ///
    /// Counts are recomputed from the outcomes rather than trusted from disk.
    pub(crate) fn restore(mut header: SessionRecord, outcomes: Vec<FetchOutcome>) -> Self {
        header.outcomes = outcomes;
        header.recount();
        header
    }

    /// Appends an outcome; outcomes are never reordered or edited afterwards
    pub(crate) fn push(&mut self, outcome: FetchOutcome) {
        self.outcomes.push(outcome);
    }

    /// Sets the end timestamp and stop reason, and fixes the derived counts
    pub(crate) fn finalize(&mut self, reason: StopReason) {
        self.finished_at = Some(Utc::now());
        self.stop_reason = Some(reason);
        self.recount();
    }

    fn recount(&mut self) {
        let succeeded = self.outcomes.iter().filter(|o| o.is_success()).count() as u64;
        self.attempted = self.outcomes.len() as u64;
        self.succeeded = succeeded;
        self.failed = self.attempted - succeeded;
    }

    pub fn outcomes(&self) -> &[FetchOutcome] {
        &self.outcomes
    }

    pub fn is_finalized(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn attempted(&self) -> u64 {
        self.attempted
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    /// Success rate as a percentage of attempted pages
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        (self.succeeded as f64 / self.attempted as f64) * 100.0
    }

    /// Session wall time, once finalized
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|finished| finished - self.started_at)
    }
}
