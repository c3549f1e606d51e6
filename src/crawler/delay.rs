//! Jittered delays and the pacer that waits them out
//!
//! The delay value is drawn uniformly from a configured range. Waiting is
//! delegated to a `Pacer` so the retry loop and the session loop can be driven
//! without a real clock.

use rand::Rng;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

/// Uniform delay range, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    min: Duration,
    max: Duration,
}

impl DelayRange {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }

    /// Builds a range from `(min, max)` seconds
    ///
    /// Negative or NaN bounds become zero; bounds too large for a `Duration`
    /// saturate at `Duration::MAX`.
    pub fn from_secs_f64((min, max): (f64, f64)) -> Self {
        Self::new(secs_to_duration(min), secs_to_duration(max))
    }

    pub fn is_zero(&self) -> bool {
        self.max.is_zero()
    }

    /// Draws one delay from the range
    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let secs = rand::rng().random_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        secs_to_duration(secs)
    }
}

fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Waits out delays between requests
pub trait Pacer: Send + Sync {
    fn pause(&self, delay: Duration) -> impl Future<Output = ()> + Send;
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

impl Pacer for TokioPacer {
    fn pause(&self, delay: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(delay)
    }
}

/// Records requested delays and returns immediately
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingPacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delay requested so far, in order
    pub fn pauses(&self) -> Vec<Duration> {
        match self.pauses.lock() {
            Ok(pauses) => pauses.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Pacer for RecordingPacer {
    fn pause(&self, delay: Duration) -> impl Future<Output = ()> + Send {
        match self.pauses.lock() {
            Ok(mut pauses) => pauses.push(delay),
            Err(poisoned) => poisoned.into_inner().push(delay),
        }
        std::future::ready(())
    }
}
