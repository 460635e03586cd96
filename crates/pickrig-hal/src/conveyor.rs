//! `Conveyor` capability for the target feed.

use std::ops::RangeInclusive;

use pickrig_types::RigError;

/// Belt speeds the conveyor controller accepts, in mm/s.
pub const CONVEYOR_SPEED_RANGE_MM_S: RangeInclusive<f64> = 0.0..=200.0;

/// Reject a belt speed outside [`CONVEYOR_SPEED_RANGE_MM_S`].
///
/// An out-of-range speed is a configuration mistake, not a device fault, so
/// it maps to [`RigError::InvalidConfig`].
pub fn check_conveyor_speed(mm_per_s: f64) -> Result<(), RigError> {
    if CONVEYOR_SPEED_RANGE_MM_S.contains(&mm_per_s) {
        Ok(())
    } else {
        Err(RigError::InvalidConfig(format!(
            "conveyor velocity {mm_per_s} mm/s outside {}..={} mm/s",
            CONVEYOR_SPEED_RANGE_MM_S.start(),
            CONVEYOR_SPEED_RANGE_MM_S.end()
        )))
    }
}

/// A constant-speed conveyor belt.
pub trait Conveyor: Send + Sync {
    /// Stable identifier, e.g. `"conveyor"`.
    fn id(&self) -> &str;

    /// Set the belt speed in mm/s.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::InvalidConfig`] for a speed outside
    /// [`CONVEYOR_SPEED_RANGE_MM_S`] and [`RigError::CollaboratorFault`]
    /// when the command cannot be sent.
    fn set_velocity(&mut self, mm_per_s: f64) -> Result<(), RigError>;

    /// Start the belt moving forward (`true`) or backward (`false`).
    ///
    /// # Errors
    ///
    /// Returns [`RigError::CollaboratorFault`] when the command cannot be
    /// sent.
    fn run(&mut self, forward: bool) -> Result<(), RigError>;

    /// Halt the belt.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::CollaboratorFault`] when the command cannot be
    /// sent.
    fn stop(&mut self) -> Result<(), RigError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_range_bounds_are_inclusive() {
        assert!(check_conveyor_speed(0.0).is_ok());
        assert!(check_conveyor_speed(20.0).is_ok());
        assert!(check_conveyor_speed(200.0).is_ok());
    }

    #[test]
    fn out_of_range_speed_is_a_config_error() {
        assert!(matches!(
            check_conveyor_speed(-1.0),
            Err(RigError::InvalidConfig(_))
        ));
        assert!(matches!(
            check_conveyor_speed(200.5),
            Err(RigError::InvalidConfig(_))
        ));
        assert!(check_conveyor_speed(f64::NAN).is_err());
    }
}
