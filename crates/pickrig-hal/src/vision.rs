//! `Vision` capability: the single source of target observations.

use std::time::Duration;

use pickrig_types::{Observation, RigError};

/// A target detector.
pub trait Vision: Send + Sync {
    /// Stable identifier, e.g. `"vision"`.
    fn id(&self) -> &str;

    /// Block until the next detection arrives and return it stamped with the
    /// monotonic instant of receipt.
    ///
    /// `timeout` bounds the wait; `None` waits indefinitely.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::ObservationTimeout`] when `timeout` elapses first
    /// and [`RigError::CollaboratorFault`] for transport or framing errors.
    fn next_detection(&mut self, timeout: Option<Duration>) -> Result<Observation, RigError>;

    /// Drop detections that completed before the caller started waiting and
    /// return how many were dropped.  Called once per observation, not per
    /// [`next_detection`](Vision::next_detection) call, so a wait may be
    /// split into several reads without losing frames.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::CollaboratorFault`] for transport errors.
    fn discard_stale(&mut self) -> Result<usize, RigError> {
        Ok(0)
    }
}
