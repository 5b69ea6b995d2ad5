//! Recorder lifecycle.
//!
//! # State Machine
//!
//! ```text
//! Created → Accumulating → Emitted
//!         ─────────────────→ Emitted
//! ```
//!
//! `Emitted` is terminal: once a recorder has written its final record,
//! every further call is rejected with
//! [`TelemetryError::RecorderConsumed`].

use serde::{Deserialize, Serialize};

use crate::error::{TelemetryError, TelemetryResult};

/// State of a detail or summary recorder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecorderState {
    /// Nothing recorded yet.
    #[default]
    Created,
    /// At least one call has added data.
    Accumulating,
    /// The final record has been written.
    Emitted,
}

impl RecorderState {
    /// Check if this is a terminal state (no further transitions allowed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, RecorderState::Emitted)
    }

    /// Validate a state transition.
    pub fn can_transition_to(&self, next: RecorderState) -> Result<(), String> {
        match (self, next) {
            (RecorderState::Created, RecorderState::Accumulating) => Ok(()),
            (RecorderState::Created, RecorderState::Emitted) => Ok(()),
            (RecorderState::Accumulating, RecorderState::Accumulating) => Ok(()),
            (RecorderState::Accumulating, RecorderState::Emitted) => Ok(()),

            (current, _) if current.is_terminal() => Err(format!(
                "Cannot transition from terminal state {:?}",
                current
            )),

            (current, next) => Err(format!(
                "Invalid transition from {:?} to {:?}",
                current, next
            )),
        }
    }

    /// Moves to `next`, or reports which recorder operation was rejected.
    pub(crate) fn advance(
        &mut self,
        next: RecorderState,
        recorder: &'static str,
        operation: &'static str,
    ) -> TelemetryResult<()> {
        if let Err(reason) = self.can_transition_to(next) {
            tracing::debug!(
                recorder = %recorder,
                operation = %operation,
                reason = %reason,
                "Rejected recorder call"
            );
            return Err(TelemetryError::RecorderConsumed {
                recorder,
                operation,
            });
        }
        *self = next;
        Ok(())
    }
}
