//! Session module for tracking scraping runs
//!
//! # Components
//!
//! - `SessionRecord`: the ordered, append-only log of one run plus its derived counts
//! - `FetchOutcome`: the recorded result of one page
//! - `SessionRecorder`: drives a record through idle -> running -> finalized and persists it

mod model;
mod recorder;

pub use model::{
    ErrorCategory, FetchOutcome, FetchStatus, SessionPhase, SessionRecord, StopReason,
};
pub use recorder::SessionRecorder;

#[cfg(test)]
pub(crate) use model::tests::outcome as test_outcome;
