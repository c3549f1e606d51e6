//! Page-Harvester: a polite paginated page downloader
//!
//! This crate fetches sequences of pages from a single site, saves them under a
//! per-session directory, and keeps a durable record of every fetch (status,
//! timing, retries) so that sessions can be summarised and exported later.

pub mod config;
pub mod crawler;
pub mod output;
pub mod session;
pub mod storage;

use thiserror::Error;

/// Main error type for Page-Harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Metadata store error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Page store error: {0}")]
    PageStore(#[from] storage::PageStoreError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition {
        from: session::SessionPhase,
        to: session::SessionPhase,
    },

    #[error("Invalid parameter file: {0}")]
    InvalidParams(String),

    #[error("Invalid session name '{0}'")]
    InvalidSessionName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Page-Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{FetchRequest, PageFetcher, ScrapingManager};
pub use output::{AggregateStats, MetadataExporter};
pub use session::{
    ErrorCategory, FetchOutcome, FetchStatus, SessionPhase, SessionRecord, StopReason,
};
