//! Session orchestration
//!
//! `ScrapingManager` drives one session at a time: it builds the requests,
//! fetches each page, saves successful bodies, records every outcome, and
//! finalizes the session into the metadata store. Pages are processed strictly
//! one after another with the inter-page delay in between.

use crate::config::Config;
use crate::crawler::delay::{DelayRange, Pacer, TokioPacer};
use crate::crawler::fetcher::{FetchReport, PageFetcher};
use crate::crawler::request::{FetchRequest, ParamSet, RequestBuilder};
use crate::output::{load_statistics, AggregateStats};
use crate::session::{
    ErrorCategory, FetchOutcome, FetchStatus, SessionPhase, SessionRecord, SessionRecorder,
    StopReason,
};
use crate::storage::{open_storage, MetadataStore, PageStore, SqliteStorage};
use crate::{HarvestError, Result};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;

/// Main session orchestrator
pub struct ScrapingManager<S: MetadataStore = SqliteStorage, P: Pacer = TokioPacer> {
    config: Arc<Config>,
    config_hash: String,
    fetcher: PageFetcher<P>,
    pages: PageStore,
    recorder: SessionRecorder<S>,
    pacer: Arc<P>,
    page_delay: DelayRange,
}

impl ScrapingManager {
    /// Creates a manager backed by the SQLite store under the save path
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `config_hash` - Hash of the config file, recorded on every session
    ///
    /// # Returns
    ///
    /// * `Ok(ScrapingManager)` - Ready to run sessions
    /// * `Err(HarvestError)` - Store or HTTP client initialization failed
    pub fn new(config: Config, config_hash: &str) -> Result<Self> {
        let store = open_storage(&config.scraper.save_path)?;
        Self::with_parts(config, config_hash, store, Arc::new(TokioPacer))
    }
}

impl<S: MetadataStore, P: Pacer> ScrapingManager<S, P> {
    /// Creates a manager from an explicit metadata store and pacer
    pub fn with_parts(config: Config, config_hash: &str, store: S, pacer: Arc<P>) -> Result<Self> {
        let fetcher = PageFetcher::from_config(&config, pacer.clone())?;
        let pages = PageStore::new(&config.scraper.save_path);
        let page_delay = DelayRange::from_secs_f64(config.delay.page_range());

        Ok(Self {
            config: Arc::new(config),
            config_hash: config_hash.to_string(),
            fetcher,
            pages,
            recorder: SessionRecorder::new(store),
            pacer,
            page_delay,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn phase(&self) -> SessionPhase {
        self.recorder.phase()
    }

    pub fn store(&self) -> &S {
        self.recorder.store()
    }

    /// Fetches `num_pages` consecutive pages starting at `start_page`
    ///
    /// Failed pages are recorded and skipped. Only a fatal storage failure
    /// is returned as an error.
    pub async fn start_scraping_session(
        &mut self,
        session_name: &str,
        num_pages: u32,
        start_page: u32,
    ) -> Result<SessionRecord> {
        let builder = RequestBuilder::new(&self.config);
        let requests = (0..num_pages)
            .map(|offset| builder.sequential(start_page.saturating_add(offset)))
            .collect::<Result<Vec<_>>>()?;

        self.run_session(session_name, requests).await
    }

    /// Fetches one page per parameter set, in order
    pub async fn start_parameterized_session(
        &mut self,
        session_name: &str,
        param_sets: &[ParamSet],
    ) -> Result<SessionRecord> {
        let builder = RequestBuilder::new(&self.config);
        let requests = param_sets
            .iter()
            .enumerate()
            .map(|(i, params)| builder.parameterized(i + 1, params))
            .collect::<Result<Vec<_>>>()?;

        self.run_session(session_name, requests).await
    }

    /// Aggregates every session in the metadata store
    pub fn get_total_stats(&self) -> Result<AggregateStats> {
        Ok(load_statistics(self.recorder.store())?)
    }

    async fn run_session(
        &mut self,
        session_name: &str,
        requests: Vec<FetchRequest>,
    ) -> Result<SessionRecord> {
        validate_session_name(session_name)?;

        let session_dir = self.pages.session_dir(session_name);
        // A directory we cannot create means nothing can be saved
        self.pages.ensure_dir(&session_dir)?;

        self.recorder.begin(SessionRecord::new(
            session_name,
            &self.config.scraper.base_url,
            session_dir.clone(),
            &self.config_hash,
        ))?;

        tracing::info!(
            "Starting session '{}': {} pages into {}",
            session_name,
            requests.len(),
            session_dir.display()
        );

        let stop_after = self.config.session.stop_after_failures;
        let mut consecutive_failures = 0u32;
        let mut stop_reason = StopReason::Completed;
        let total = requests.len();

        for (i, request) in requests.iter().enumerate() {
            let report = self.fetcher.fetch(request).await;
            let outcome = match self.store_page(request, report, &session_dir) {
                Ok(outcome) => outcome,
                Err((outcome, err)) => {
                    tracing::error!("Storage unusable for session '{}': {}", session_name, err);
                    self.recorder.record(outcome)?;
                    self.recorder.finalize(StopReason::StorageFailure)?;
                    return Err(err.into());
                }
            };

            log_outcome(&outcome, i + 1, total);

            if outcome.is_success() {
                consecutive_failures = 0;
            } else {
                consecutive_failures += 1;
            }
            self.recorder.record(outcome)?;

            if let Some(limit) = stop_after {
                if consecutive_failures >= limit {
                    tracing::warn!(
                        "Stopping session '{}' after {} consecutive failures",
                        session_name,
                        consecutive_failures
                    );
                    stop_reason = StopReason::ConsecutiveFailures;
                    break;
                }
            }

            if i + 1 < total && !self.page_delay.is_zero() {
                let delay = self.page_delay.sample();
                tracing::debug!("Waiting {:.2}s before next page", delay.as_secs_f64());
                self.pacer.pause(delay).await;
            }
        }

        let record = self.recorder.finalize(stop_reason)?;
        tracing::info!(
            "Session '{}' finished: {}/{} pages succeeded ({:.1}%)",
            record.name,
            record.succeeded(),
            record.attempted(),
            record.success_rate()
        );

        Ok(record)
    }

    /// Turns a fetch report into an outcome, saving the body on success
    ///
    /// A fatal page-store error comes back with the outcome to record before
    /// the session is abandoned.
    fn store_page(
        &self,
        request: &FetchRequest,
        report: FetchReport,
        session_dir: &Path,
    ) -> std::result::Result<FetchOutcome, (FetchOutcome, crate::storage::PageStoreError)> {
        let mut outcome = FetchOutcome {
            page_id: request.page_id.clone(),
            url: request.url.to_string(),
            status: FetchStatus::Failure,
            http_code: report.http_code(),
            elapsed: Default::default(),
            retries: report.retries(),
            bytes: None,
            error_category: None,
            error_message: None,
            saved_path: None,
            fetched_at: Utc::now(),
        };

        match report {
            FetchReport::Failed {
                category,
                elapsed,
                message,
                ..
            } => {
                outcome.elapsed = elapsed;
                outcome.error_category = Some(category);
                outcome.error_message = Some(message);
                Ok(outcome)
            }
            FetchReport::Fetched { body, elapsed, .. } => {
                outcome.elapsed = elapsed;
                match self.pages.save(&body, session_dir, &request.filename) {
                    Ok(path) => {
                        outcome.status = FetchStatus::Success;
                        outcome.bytes = Some(body.len() as u64);
                        outcome.saved_path = Some(path);
                        Ok(outcome)
                    }
                    Err(err) => {
                        outcome.error_category = Some(ErrorCategory::StorageError);
                        outcome.error_message = Some(err.to_string());
                        if err.is_fatal() {
                            Err((outcome, err))
                        } else {
                            Ok(outcome)
                        }
                    }
                }
            }
        }
    }
}

fn log_outcome(outcome: &FetchOutcome, position: usize, total: usize) {
    match &outcome.saved_path {
        Some(path) if outcome.is_success() => tracing::info!(
            "[{}/{}] page {} saved to {} ({:.2}s)",
            position,
            total,
            outcome.page_id,
            path.display(),
            outcome.elapsed.as_secs_f64()
        ),
        _ => tracing::info!(
            "[{}/{}] page {} failed: {} ({} retries)",
            position,
            total,
            outcome.page_id,
            outcome.error_message.as_deref().unwrap_or("unknown error"),
            outcome.retries
        ),
    }
}

/// Session names become directory names under the save root
fn validate_session_name(name: &str) -> Result<()> {
    let bad = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\');

    if bad {
        return Err(HarvestError::InvalidSessionName(name.to_string()));
    }
    Ok(())
}
