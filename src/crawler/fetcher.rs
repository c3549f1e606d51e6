//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for a session, including:
//! - Building the HTTP client with the configured user agent and headers
//! - GET requests to fetch page content
//! - Retry logic for transient failures, paced by the retry delay
//! - Error classification into outcome categories
//!
//! The fetcher never touches the disk. Whatever happens on the network ends up
//! as a `FetchReport`; nothing is returned as an `Err`.

use crate::config::{Config, ScraperConfig};
use crate::crawler::delay::{DelayRange, Pacer};
use crate::crawler::request::FetchRequest;
use crate::crawler::retry::{AttemptError, RetryDecision, RetryPolicy, RetryState};
use crate::session::ErrorCategory;
use crate::{ConfigError, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{redirect::Policy, Client};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Maximum redirect hops followed per request
const MAX_REDIRECTS: usize = 10;

/// Result of a fetch operation, retries included
#[derive(Debug)]
pub enum FetchReport {
    /// A 2xx response with an acceptable body
    Fetched {
        /// Response body as received
        body: Vec<u8>,
        /// HTTP status code
        http_code: u16,
        /// Retries used before this response
        retries: u32,
        /// Wall-clock time across all attempts
        elapsed: Duration,
    },

    /// Every permitted attempt failed, or the failure was terminal
    Failed {
        category: ErrorCategory,
        /// Status of the last response, if one arrived
        http_code: Option<u16>,
        retries: u32,
        elapsed: Duration,
        message: String,
    },
}

impl FetchReport {
    pub fn retries(&self) -> u32 {
        match self {
            Self::Fetched { retries, .. } | Self::Failed { retries, .. } => *retries,
        }
    }

    pub fn http_code(&self) -> Option<u16> {
        match self {
            Self::Fetched { http_code, .. } => Some(*http_code),
            Self::Failed { http_code, .. } => *http_code,
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The scraper section (user agent, timeout)
/// * `headers` - Extra headers sent with every request
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(HarvestError)` - Invalid header or client build failure
pub fn build_http_client(
    config: &ScraperConfig,
    headers: &BTreeMap<String, String>,
) -> Result<Client> {
    let mut default_headers = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            ConfigError::Validation(format!("Invalid header name '{}': {}", name, e))
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            ConfigError::Validation(format!("Invalid value for header '{}': {}", name, e))
        })?;
        default_headers.insert(name, value);
    }

    let timeout = config.timeout();
    let client = Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .default_headers(default_headers)
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

/// Fetches pages with retry handling
pub struct PageFetcher<P: Pacer> {
    client: Client,
    policy: RetryPolicy,
    retry_delay: DelayRange,
    min_content_length: Option<usize>,
    pacer: Arc<P>,
}

impl<P: Pacer> PageFetcher<P> {
    pub fn new(
        client: Client,
        policy: RetryPolicy,
        retry_delay: DelayRange,
        min_content_length: Option<usize>,
        pacer: Arc<P>,
    ) -> Self {
        Self {
            client,
            policy,
            retry_delay,
            min_content_length,
            pacer,
        }
    }

    /// Builds a fetcher from the loaded configuration
    pub fn from_config(config: &Config, pacer: Arc<P>) -> Result<Self> {
        let client = build_http_client(&config.scraper, &config.headers)?;
        let policy = RetryPolicy {
            max_retries: config.scraper.max_retries,
            retry_content_errors: config.session.retry_content_errors,
        };

        Ok(Self::new(
            client,
            policy,
            DelayRange::from_secs_f64(config.delay.retry_range()),
            config.session.min_content_length,
            pacer,
        ))
    }

    /// Fetches one page, retrying per the retry policy
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 2xx, body long enough | Done |
    /// | HTTP 5xx / 429 | Retry up to `max_retries`, jittered delay |
    /// | Timeout / connection error | Retry up to `max_retries`, jittered delay |
    /// | Other non-2xx | Immediate failure |
    /// | Body too short | Retry if `retry-content-errors`, else fail |
    ///
    /// The retry delay is only waited between attempts, never before the first
    /// or after the last.
    pub async fn fetch(&self, request: &FetchRequest) -> FetchReport {
        let policy = RetryPolicy {
            max_retries: request.max_retries,
            ..self.policy
        };
        let mut state = RetryState::new(policy);
        let start = Instant::now();

        loop {
            let error = match self.attempt(request).await {
                Ok((http_code, body)) => {
                    return FetchReport::Fetched {
                        body,
                        http_code,
                        retries: state.retries(),
                        elapsed: start.elapsed(),
                    };
                }
                Err(error) => error,
            };

            let http_code = error.http_code();
            let message = error.to_string();

            match state.on_failure(error) {
                RetryDecision::Retry { retry } => {
                    let delay = self.retry_delay.sample();
                    tracing::warn!(
                        "{} failed ({}); retry {}/{} in {:.2}s",
                        request.url,
                        message,
                        retry,
                        policy.max_retries,
                        delay.as_secs_f64()
                    );
                    self.pacer.pause(delay).await;
                }
                RetryDecision::GiveUp { category } => {
                    return FetchReport::Failed {
                        category,
                        http_code,
                        retries: state.retries(),
                        elapsed: start.elapsed(),
                        message,
                    };
                }
            }
        }
    }

    /// Performs a single GET and checks the response
    async fn attempt(
        &self,
        request: &FetchRequest,
    ) -> std::result::Result<(u16, Vec<u8>), AttemptError> {
        let response = self
            .client
            .get(request.url.clone())
            .send()
            .await
            .map_err(classify_network_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(classify_network_error)?
            .to_vec();

        if let Some(minimum) = self.min_content_length {
            if body.len() < minimum {
                return Err(AttemptError::Content {
                    http_code: status.as_u16(),
                    bytes: body.len(),
                    minimum,
                });
            }
        }

        Ok((status.as_u16(), body))
    }
}

fn classify_network_error(e: reqwest::Error) -> AttemptError {
    if e.is_timeout() {
        AttemptError::Network("Request timeout".to_string())
    } else if e.is_connect() {
        AttemptError::Network("Connection refused".to_string())
    } else if e.is_redirect() {
        AttemptError::Network(format!("Redirect error: {}", e))
    } else {
        AttemptError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::delay::RecordingPacer;
    use crate::crawler::request::build_url;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn scraper_config() -> ScraperConfig {
        ScraperConfig {
            base_url: "https://example.test".to_string(),
            save_path: "out".into(),
            user_agent: "TestHarvester/1.0".to_string(),
            timeout_secs: 5,
            max_retries: 2,
        }
    }

    fn fetcher(
        max_retries: u32,
        min_content_length: Option<usize>,
    ) -> (PageFetcher<RecordingPacer>, Arc<RecordingPacer>) {
        let pacer = Arc::new(RecordingPacer::new());
        let client = build_http_client(&scraper_config(), &BTreeMap::new()).unwrap();
        let fetcher = PageFetcher::new(
            client,
            RetryPolicy {
                max_retries,
                retry_content_errors: true,
            },
            DelayRange::from_secs_f64((1.0, 1.0)),
            min_content_length,
            pacer.clone(),
        );
        (fetcher, pacer)
    }

    fn request(server: &MockServer, page: &str, max_retries: u32) -> FetchRequest {
        FetchRequest {
            page_id: page.to_string(),
            url: build_url(&server.uri(), page).unwrap(),
            filename: format!("page_{}.html", page),
            max_retries,
        }
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&scraper_config(), &BTreeMap::new()).is_ok());
    }

    #[test]
    fn test_invalid_header_rejected() {
        let mut headers = BTreeMap::new();
        headers.insert("bad header".to_string(), "x".to_string());
        assert!(build_http_client(&scraper_config(), &headers).is_err());
    }

    #[tokio::test]
    async fn test_success_without_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1"))
            .and(header("user-agent", "TestHarvester/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>one</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let (fetcher, pacer) = fetcher(2, None);
        let report = fetcher.fetch(&request(&server, "1", 2)).await;

        match report {
            FetchReport::Fetched {
                body,
                http_code,
                retries,
                ..
            } => {
                assert_eq!(body, b"<html>one</html>");
                assert_eq!(http_code, 200);
                assert_eq!(retries, 0);
            }
            other => panic!("expected success, got {:?}", other),
        }
        assert!(pacer.pauses().is_empty());
    }

    #[tokio::test]
    async fn test_server_error_uses_full_budget() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let (fetcher, pacer) = fetcher(2, None);
        let report = fetcher.fetch(&request(&server, "2", 2)).await;

        match report {
            FetchReport::Failed {
                category,
                http_code,
                retries,
                ..
            } => {
                assert_eq!(category, ErrorCategory::RetryableHttpError);
                assert_eq!(http_code, Some(500));
                assert_eq!(retries, 2);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        // One pause between each pair of attempts
        assert_eq!(pacer.pauses(), vec![Duration::from_secs(1); 2]);
    }

    #[tokio::test]
    async fn test_not_found_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let (fetcher, pacer) = fetcher(3, None);
        let report = fetcher.fetch(&request(&server, "9", 3)).await;

        assert!(matches!(
            report,
            FetchReport::Failed {
                category: ErrorCategory::HttpError,
                http_code: Some(404),
                retries: 0,
                ..
            }
        ));
        assert!(pacer.pauses().is_empty());
    }

    #[tokio::test]
    async fn test_recovers_after_transient_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/3"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/3"))
            .respond_with(ResponseTemplate::new(200).set_body_string("third"))
            .mount(&server)
            .await;

        let (fetcher, _) = fetcher(2, None);
        let report = fetcher.fetch(&request(&server, "3", 2)).await;

        assert_eq!(report.retries(), 1);
        assert_eq!(report.http_code(), Some(200));
    }

    #[tokio::test]
    async fn test_short_body_is_content_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("tiny"))
            .expect(2)
            .mount(&server)
            .await;

        let (fetcher, _) = fetcher(1, Some(100));
        let report = fetcher.fetch(&request(&server, "1", 1)).await;

        assert!(matches!(
            report,
            FetchReport::Failed {
                category: ErrorCategory::ContentError,
                http_code: Some(200),
                retries: 1,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Nothing listens on a port whose listener was dropped
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let request = FetchRequest {
            page_id: "1".to_string(),
            url: build_url(&format!("http://127.0.0.1:{}", port), "1").unwrap(),
            filename: "page_1.html".to_string(),
            max_retries: 1,
        };

        let (fetcher, pacer) = fetcher(1, None);
        let report = fetcher.fetch(&request).await;

        assert!(matches!(
            report,
            FetchReport::Failed {
                category: ErrorCategory::NetworkError,
                http_code: None,
                retries: 1,
                ..
            }
        ));
        assert_eq!(pacer.pauses().len(), 1);
    }
}
