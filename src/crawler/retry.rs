//! Retry policy as an explicit state machine
//!
//! `RetryState` tracks how many retries a request has consumed and what went
//! wrong last. The fetcher feeds it each failed attempt and follows the
//! decision it returns; no I/O or clock is involved here.
//!
//! | Failure | Action |
//! |---------|--------|
//! | Connection error / timeout | Retry, then `network_error` |
//! | HTTP 5xx, HTTP 429 | Retry, then `retryable_http_error` |
//! | Any other non-2xx | Stop immediately, `http_error` |
//! | Body below minimum length | Retry if configured, then `content_error` |

use crate::session::ErrorCategory;
use std::fmt;

/// Retry budget and content-error handling for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_content_errors: bool,
}

/// Why a single attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    /// No usable response (connect failure, timeout, body read error)
    Network(String),

    /// Response arrived with a non-2xx status
    Status(u16),

    /// 2xx response whose body is shorter than required
    Content {
        http_code: u16,
        bytes: usize,
        minimum: usize,
    },
}

impl AttemptError {
    pub fn http_code(&self) -> Option<u16> {
        match self {
            Self::Network(_) => None,
            Self::Status(code) => Some(*code),
            Self::Content { http_code, .. } => Some(*http_code),
        }
    }
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(error) => write!(f, "{}", error),
            Self::Status(code) => write!(f, "HTTP {}", code),
            Self::Content { bytes, minimum, .. } => {
                write!(f, "body of {} bytes is below the {} byte minimum", bytes, minimum)
            }
        }
    }
}

/// Whether an HTTP status is worth retrying (server errors and rate limits)
pub fn is_retryable_status(code: u16) -> bool {
    code == 429 || (500..600).contains(&code)
}

/// What the fetcher should do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait the retry delay, then make retry number `retry`
    Retry { retry: u32 },

    /// Stop and report the failure under `category`
    GiveUp { category: ErrorCategory },
}

/// Attempt count and last error for one request
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    retries: u32,
    last_error: Option<AttemptError>,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            retries: 0,
            last_error: None,
        }
    }

    /// Retries consumed so far
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn last_error(&self) -> Option<&AttemptError> {
        self.last_error.as_ref()
    }

    /// Records a failed attempt and decides whether to try again
    pub fn on_failure(&mut self, error: AttemptError) -> RetryDecision {
        let (retryable, category) = match &error {
            AttemptError::Network(_) => (true, ErrorCategory::NetworkError),
            AttemptError::Status(code) if is_retryable_status(*code) => {
                (true, ErrorCategory::RetryableHttpError)
            }
            AttemptError::Status(_) => (false, ErrorCategory::HttpError),
            AttemptError::Content { .. } => {
                (self.policy.retry_content_errors, ErrorCategory::ContentError)
            }
        };
        self.last_error = Some(error);

        if !retryable || self.retries >= self.policy.max_retries {
            return RetryDecision::GiveUp { category };
        }

        self.retries += 1;
        RetryDecision::Retry {
            retry: self.retries,
        }
    }
}
