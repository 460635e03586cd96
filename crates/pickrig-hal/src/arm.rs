//! `Arm` capability for a Cartesian-commanded robot arm.
//!
//! Every method is fire-and-forget: it returns as soon as the command has
//! been handed to the transport, never after the motion completes.  The
//! synchronizer relies on this to keep its deadlines free of device latency.

use std::time::Duration;

use pickrig_types::{Pose6, RigError};

/// A robot arm addressed through its tool center point.
pub trait Arm: Send + Sync {
    /// Stable identifier used in logs and fault reports, e.g. `"ur_arm"`.
    fn id(&self) -> &str;

    /// Linear move to `pose` applied on top of the current TCP pose.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::CollaboratorFault`] if the command could not be
    /// sent.
    fn move_relative(&mut self, pose: Pose6, accel: f64, vel: f64) -> Result<(), RigError>;

    /// Linear move to the absolute base-frame `pose`.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::CollaboratorFault`] if the command could not be
    /// sent.
    fn move_absolute(&mut self, pose: Pose6, accel: f64, vel: f64) -> Result<(), RigError>;

    /// Hold a Cartesian TCP velocity for `duration` (`Duration::ZERO` means
    /// until the next command).
    ///
    /// # Errors
    ///
    /// Returns [`RigError::CollaboratorFault`] if the command could not be
    /// sent.
    fn set_cartesian_velocity(
        &mut self,
        velocity: [f64; 6],
        accel: f64,
        duration: Duration,
    ) -> Result<(), RigError>;
}
