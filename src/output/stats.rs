//! Statistics derived from the metadata store
//!
//! Totals are always recomputed by folding over the stored sessions; nothing
//! here is cached between calls.

use crate::session::{ErrorCategory, SessionRecord};
use crate::storage::{MetadataStore, StorageResult};
use std::collections::HashMap;
use std::time::Duration;

/// Totals across every recorded session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateStats {
    /// Number of sessions folded in
    pub sessions: u64,

    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,

    /// Bytes written across all saved pages
    pub bytes_saved: u64,

    /// Summed fetch time, retries and retry delays included
    pub fetch_time: Duration,

    /// Failure counts by category
    pub errors: HashMap<ErrorCategory, u64>,
}

impl AggregateStats {
    /// Folds a set of session records into totals
    pub fn from_sessions(sessions: &[SessionRecord]) -> Self {
        sessions.iter().fold(Self::default(), |mut stats, session| {
            stats.sessions += 1;
            stats.attempted += session.attempted();
            stats.succeeded += session.succeeded();
            stats.failed += session.failed();

            for outcome in session.outcomes() {
                stats.bytes_saved += outcome.bytes.unwrap_or(0);
                stats.fetch_time += outcome.elapsed;
                if let Some(category) = outcome.error_category {
                    *stats.errors.entry(category).or_insert(0) += 1;
                }
            }
            stats
        })
    }

    /// Success rate as a percentage of attempted pages
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        (self.succeeded as f64 / self.attempted as f64) * 100.0
    }

    /// Mean fetch time per attempted page
    pub fn average_fetch_time(&self) -> Duration {
        if self.attempted == 0 {
            return Duration::ZERO;
        }
        self.fetch_time.div_f64(self.attempted as f64)
    }
}

/// Loads statistics from the metadata store
///
/// # Arguments
///
/// * `store` - The metadata store to fold over
///
/// # Returns
///
/// * `Ok(AggregateStats)` - Totals over every stored session
/// * `Err(StorageError)` - Failed to read the store
pub fn load_statistics<S: MetadataStore + ?Sized>(store: &S) -> StorageResult<AggregateStats> {
    let sessions = store.load_sessions()?;
    Ok(AggregateStats::from_sessions(&sessions))
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &AggregateStats, sessions: &[SessionRecord]) {
    println!("=== Scraping Statistics ===\n");

    println!("Overview:");
    println!("  Sessions: {}", stats.sessions);
    println!("  Pages attempted: {}", stats.attempted);
    println!("  Pages saved: {}", stats.succeeded);
    println!("  Pages failed: {}", stats.failed);
    println!("  Bytes saved: {}", stats.bytes_saved);
    println!(
        "  Average fetch time: {:.2}s",
        stats.average_fetch_time().as_secs_f64()
    );
    println!();

    if !sessions.is_empty() {
        println!("Sessions:");
        for session in sessions {
            let took = match session.duration() {
                Some(duration) => format!(" in {}s", duration.num_seconds()),
                None => String::new(),
            };
            println!(
                "  {} ({}): {}/{} pages ({:.1}%){}",
                session.name,
                session.started_at.format("%Y-%m-%d %H:%M:%S"),
                session.succeeded(),
                session.attempted(),
                session.success_rate(),
                took
            );
        }
        println!();
    }

    if !stats.errors.is_empty() {
        println!("Error Summary:");
        let mut error_counts: Vec<_> = stats.errors.iter().collect();
        error_counts.sort_by(|a, b| b.1.cmp(a.1).then(a.0.to_db_string().cmp(b.0.to_db_string())));

        for (category, count) in error_counts {
            println!("  {}: {}", category.to_db_string(), count);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} pages saved)",
        stats.success_rate(),
        stats.succeeded,
        stats.attempted
    );
}
