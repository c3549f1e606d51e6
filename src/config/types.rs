use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Page-Harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub scraper: ScraperConfig,
    pub delay: DelayConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub output: OutputConfig,
    /// Extra request headers sent with every fetch (e.g. a session cookie)
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Target site and HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Base URL every page path is joined onto
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Root directory for session directories and the metadata store
    #[serde(rename = "save-path")]
    pub save_path: PathBuf,

    /// Identification header sent as User-Agent
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Number of retries allowed after the first attempt
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,
}

impl ScraperConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Jittered delay configuration (seconds)
#[derive(Debug, Clone, Deserialize)]
pub struct DelayConfig {
    /// Lower bound of the inter-page delay
    #[serde(rename = "min-seconds")]
    pub min_seconds: f64,

    /// Upper bound of the inter-page delay
    #[serde(rename = "max-seconds")]
    pub max_seconds: f64,

    /// Lower bound of the retry delay; falls back to `min-seconds`
    #[serde(rename = "retry-min-seconds", default)]
    pub retry_min_seconds: Option<f64>,

    /// Upper bound of the retry delay; falls back to `max-seconds`
    #[serde(rename = "retry-max-seconds", default)]
    pub retry_max_seconds: Option<f64>,
}

impl DelayConfig {
    /// Delay range applied between independent pages
    pub fn page_range(&self) -> (f64, f64) {
        (self.min_seconds, self.max_seconds)
    }

    /// Delay range applied between retry attempts of one page
    pub fn retry_range(&self) -> (f64, f64) {
        (
            self.retry_min_seconds.unwrap_or(self.min_seconds),
            self.retry_max_seconds.unwrap_or(self.max_seconds),
        )
    }

    /// Zeroes every delay (the `--no-delay` switch)
    pub fn disable(&mut self) {
        self.min_seconds = 0.0;
        self.max_seconds = 0.0;
        self.retry_min_seconds = Some(0.0);
        self.retry_max_seconds = Some(0.0);
    }
}

/// Per-session behavior
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Path appended to the base URL; `{page}` is the page number
    #[serde(rename = "path-template", default = "default_path_template")]
    pub path_template: String,

    /// Path appended to the base URL in parameterized mode; `{name}`
    /// placeholders are filled from the parameter set, the rest go to the query
    #[serde(rename = "param-path-template", default)]
    pub param_path_template: String,

    /// Filename for sequential pages; must contain `{page}`
    #[serde(rename = "filename-template", default = "default_filename_template")]
    pub filename_template: String,

    /// Filename for parameterized pages; must contain `{index}`
    #[serde(
        rename = "param-filename-template",
        default = "default_param_filename_template"
    )]
    pub param_filename_template: String,

    /// Bodies shorter than this many bytes are treated as content errors
    #[serde(rename = "min-content-length", default)]
    pub min_content_length: Option<usize>,

    /// Whether a content error consumes retry budget or fails immediately
    #[serde(rename = "retry-content-errors", default = "default_true")]
    pub retry_content_errors: bool,

    /// Stop the session after this many failures in a row
    #[serde(rename = "stop-after-failures", default)]
    pub stop_after_failures: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path_template: default_path_template(),
            param_path_template: String::new(),
            filename_template: default_filename_template(),
            param_filename_template: default_param_filename_template(),
            min_content_length: None,
            retry_content_errors: true,
            stop_after_failures: None,
        }
    }
}

/// Export configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// CSV summary filename, relative to the save path
    #[serde(rename = "export-name", default = "default_export_name")]
    pub export_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            export_name: default_export_name(),
        }
    }
}

fn default_user_agent() -> String {
    format!("page-harvester/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_path_template() -> String {
    "{page}".to_string()
}

fn default_filename_template() -> String {
    "page_{page}.html".to_string()
}

fn default_param_filename_template() -> String {
    "params_{index}.html".to_string()
}

fn default_export_name() -> String {
    "scraping_summary.csv".to_string()
}

fn default_true() -> bool {
    true
}
