//! [`InterceptPlanner`] – from one sensor observation to one arm command.
//!
//! The sensor and the arm disagree on axes: the sensor's longitudinal offset
//! is the arm's X (along the belt), the sensor's lateral offset is the arm's
//! Y with the opposite handedness, and the sensor reports degrees where the
//! arm expects radians about a negated Z.  The planner applies the mounting
//! calibration, solves the intercept time, then pulls the along-belt target
//! back by the drift the target accumulates during the approach so the arm
//! is commanded to where the target *will be*.

use pickrig_types::{Calibration, InterceptPlan, MotionLimits, Observation, Pose6, RigError};
use tracing::{debug, info};

use crate::intercept::solve_intercept_time;

/// Arm-frame displacement to the grasp point at the moment of observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmOffset {
    /// Along the belt (m).
    pub dx: f64,
    /// Across the belt, sensor handedness (m).
    pub dy: f64,
    /// Vertical, negative is down (m).
    pub dz: f64,
    /// Target yaw (rad).
    pub dtheta: f64,
}

/// Plans a single intercept from calibration constants and motion limits.
#[derive(Debug, Clone, Copy)]
pub struct InterceptPlanner {
    calibration: Calibration,
    limits: MotionLimits,
}

impl InterceptPlanner {
    pub fn new(calibration: Calibration, limits: MotionLimits) -> Self {
        Self { calibration, limits }
    }

    pub fn limits(&self) -> &MotionLimits {
        &self.limits
    }

    /// Map sensor-frame millimetres/degrees to the arm-frame grasp offset.
    pub fn arm_offset(&self, observation: &Observation) -> ArmOffset {
        let cal = &self.calibration;
        ArmOffset {
            dx: (observation.dy + cal.camera_offset_x_mm + cal.box_width_mm * cal.width_bias) * 1e-3,
            dy: observation.dx * 1e-3,
            dz: -(cal.standoff_height_mm - cal.box_height_mm * cal.height_bias) * 1e-3,
            dtheta: observation.theta.to_radians(),
        }
    }

    /// Build the intercept command for `observation`.
    ///
    /// # Errors
    ///
    /// Propagates [`RigError::Domain`] and [`RigError::UnreachableTarget`]
    /// from the solver unchanged; no partial plan is ever returned.
    pub fn plan(&self, observation: &Observation) -> Result<InterceptPlan, RigError> {
        let offset = self.arm_offset(observation);
        let MotionLimits {
            v_max,
            a_max,
            v_conveyor,
        } = self.limits;
        debug!(?offset, "arm-frame offset");

        let t_intercept = solve_intercept_time(offset.dx, offset.dy, offset.dz, v_conveyor, v_max, a_max)?
            .t_intercept();

        let relative_pose = Pose6::new(
            offset.dx - v_conveyor * t_intercept,
            -offset.dy,
            offset.dz,
            self.calibration.approach_tilt_rad,
            0.0,
            -offset.dtheta,
        );
        info!(t_intercept, ?relative_pose, "intercept planned");

        Ok(InterceptPlan {
            relative_pose,
            accel: a_max,
            vel: v_max,
            t_intercept,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn observation(dx: f64, dy: f64, theta: f64) -> Observation {
        Observation {
            dx,
            dy,
            theta,
            t_ref: Instant::now(),
        }
    }

    fn planner() -> InterceptPlanner {
        InterceptPlanner::new(Calibration::default(), MotionLimits::default())
    }

    #[test]
    fn arm_offset_applies_mounting_calibration() {
        let offset = planner().arm_offset(&observation(5.0, -10.0, 90.0));
        // (-10 + 185.15 + 115/3) mm
        assert!((offset.dx - (-10.0 + 185.15 + 115.0 / 3.0) * 1e-3).abs() < 1e-12);
        assert!((offset.dy - 0.005).abs() < 1e-12);
        // -(380 - 132.5·2/3) mm
        assert!((offset.dz - -(380.0 - 132.5 * 2.0 / 3.0) * 1e-3).abs() < 1e-12);
        assert!((offset.dtheta - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn plan_anticipates_conveyor_drift() {
        let planner = planner();
        let obs = observation(5.0, 0.0, 30.0);
        let offset = planner.arm_offset(&obs);
        let plan = planner.plan(&obs).unwrap();
        let limits = MotionLimits::default();

        let expected_t = solve_intercept_time(offset.dx, offset.dy, offset.dz, limits.v_conveyor, limits.v_max, limits.a_max)
            .unwrap()
            .t_intercept();
        assert_eq!(plan.t_intercept.to_bits(), expected_t.to_bits());
        assert!((plan.relative_pose.x - (offset.dx - limits.v_conveyor * expected_t)).abs() < 1e-12);
        assert!(plan.relative_pose.x < offset.dx);
    }

    #[test]
    fn plan_flips_handedness_and_orientation() {
        let plan = planner().plan(&observation(8.0, 0.0, 45.0)).unwrap();
        assert!((plan.relative_pose.y - -0.008).abs() < 1e-12);
        assert!((plan.relative_pose.rz - -std::f64::consts::FRAC_PI_4).abs() < 1e-12);
        assert!((plan.relative_pose.rx - -std::f64::consts::FRAC_PI_6).abs() < 1e-12);
        assert_eq!(plan.relative_pose.ry, 0.0);
    }

    #[test]
    fn plan_commands_configured_limits() {
        let plan = planner().plan(&observation(0.0, 0.0, 0.0)).unwrap();
        assert_eq!(plan.accel, 5.0);
        assert_eq!(plan.vel, 3.0);
        assert!(plan.t_intercept > 0.0);
    }

    #[test]
    fn solver_errors_propagate_unchanged() {
        let degenerate = InterceptPlanner::new(
            Calibration::default(),
            MotionLimits {
                v_max: 0.5,
                a_max: 2.0,
                v_conveyor: 0.5,
            },
        );
        assert!(matches!(
            degenerate.plan(&observation(0.0, 0.0, 0.0)),
            Err(RigError::Domain(_))
        ));

        let too_slow = InterceptPlanner::new(
            Calibration::default(),
            MotionLimits {
                v_max: 0.1,
                a_max: 1.0,
                v_conveyor: 0.5,
            },
        );
        assert!(matches!(
            too_slow.plan(&observation(1000.0, 0.0, 0.0)),
            Err(RigError::UnreachableTarget { .. })
        ));
    }
}
