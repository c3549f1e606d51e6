//! Session bookkeeping
//!
//! The recorder holds the active `SessionRecord`, appends outcomes as pages
//! complete, and writes the finalized record to the metadata store.

use crate::session::model::{FetchOutcome, SessionPhase, SessionRecord, StopReason};
use crate::storage::MetadataStore;
use crate::HarvestError;

/// Accumulates outcomes for one session at a time and persists them
pub struct SessionRecorder<S: MetadataStore> {
    store: S,
    phase: SessionPhase,
    active: Option<SessionRecord>,
}

impl<S: MetadataStore> SessionRecorder<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            phase: SessionPhase::Idle,
            active: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// The session currently being recorded, if any
    pub fn active(&self) -> Option<&SessionRecord> {
        self.active.as_ref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Starts recording a new session
    ///
    /// Allowed from `Idle`, or from `Finalized` for the next session. A session
    /// that is still running must be finalized first.
    pub fn begin(&mut self, record: SessionRecord) -> Result<(), HarvestError> {
        if self.phase == SessionPhase::Running {
            return Err(HarvestError::InvalidTransition {
                from: self.phase,
                to: SessionPhase::Running,
            });
        }

        tracing::debug!("Recording session '{}'", record.name);
        self.active = Some(record);
        self.phase = SessionPhase::Running;
        Ok(())
    }

    /// Appends one outcome to the running session
    pub fn record(&mut self, outcome: FetchOutcome) -> Result<(), HarvestError> {
        match (self.phase, self.active.as_mut()) {
            (SessionPhase::Running, Some(record)) => {
                record.push(outcome);
                Ok(())
            }
            _ => Err(HarvestError::InvalidTransition {
                from: self.phase,
                to: SessionPhase::Running,
            }),
        }
    }

    /// Closes the running session and merges it into the metadata store
    pub fn finalize(&mut self, reason: StopReason) -> Result<SessionRecord, HarvestError> {
        let mut record = match (self.phase, self.active.take()) {
            (SessionPhase::Running, Some(record)) => record,
            (phase, active) => {
                self.active = active;
                return Err(HarvestError::InvalidTransition {
                    from: phase,
                    to: SessionPhase::Finalized,
                });
            }
        };

        record.finalize(reason);
        self.phase = SessionPhase::Finalized;

        self.store.save_session(&record)?;
        tracing::debug!(
            "Persisted session '{}' ({} outcomes)",
            record.name,
            record.attempted()
        );

        Ok(record)
    }
}
