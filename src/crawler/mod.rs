//! Crawler module for fetching paginated pages
//!
//! This module contains the session logic, including:
//! - Request construction (page and parameter-set to URL and filename)
//! - HTTP fetching with an explicit retry state machine
//! - Jittered delays behind an injectable pacer
//! - Overall session coordination

mod delay;
mod fetcher;
mod manager;
mod request;
mod retry;

pub use delay::{DelayRange, Pacer, RecordingPacer, TokioPacer};
pub use fetcher::{build_http_client, FetchReport, PageFetcher};
pub use manager::ScrapingManager;
pub use request::{
    build_url, filename_for, load_param_sets, parse_param_sets, FetchRequest, ParamSet,
    RequestBuilder,
};
pub use retry::{is_retryable_status, AttemptError, RetryDecision, RetryPolicy, RetryState};
