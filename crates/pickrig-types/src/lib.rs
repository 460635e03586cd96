//! `pickrig-types` – shared data model for the pick rig.
//!
//! Every crate in the workspace speaks in these types: the vision
//! [`Observation`] that starts a cycle, the configuration inputs
//! ([`MotionLimits`], [`Calibration`], [`ScheduleConfig`]), the derived
//! [`InterceptSolution`] / [`InterceptPlan`], the [`Stage`] state machine of
//! the deadline schedule, and the workspace-wide [`RigError`].
//!
//! The [`clock`] module holds the monotonic time source abstraction used by
//! both the drivers (to stamp observations) and the synchronizer (to gate
//! deadlines).

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod clock;

pub use clock::{Clock, MonotonicClock, SimClock};

// ────────────────────────────────────────────────────────────────────────────
// Geometry
// ────────────────────────────────────────────────────────────────────────────

/// A 6-axis Cartesian pose or displacement: translation in metres followed
/// by a rotation vector in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose6 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
}

impl Pose6 {
    pub fn new(x: f64, y: f64, z: f64, rx: f64, ry: f64, rz: f64) -> Self {
        Self { x, y, z, rx, ry, rz }
    }

    /// Length of the translational part.
    pub fn translation_norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn to_array(self) -> [f64; 6] {
        [self.x, self.y, self.z, self.rx, self.ry, self.rz]
    }
}

impl From<[f64; 6]> for Pose6 {
    fn from(v: [f64; 6]) -> Self {
        Self::new(v[0], v[1], v[2], v[3], v[4], v[5])
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Sensing
// ────────────────────────────────────────────────────────────────────────────

/// Payload of one vision detection, without its timestamp.
///
/// Offsets are in millimetres relative to the sensor reference frame and the
/// orientation is in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub dx: f64,
    pub dy: f64,
    pub theta: f64,
}

/// A timestamped detection.  `t_ref` is the only ground-truth instant
/// correlated with the target's real position; every deadline of the cycle
/// is measured from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Lateral offset in the sensor frame (mm).
    pub dx: f64,
    /// Longitudinal offset in the sensor frame (mm).
    pub dy: f64,
    /// Target orientation (degrees).
    pub theta: f64,
    /// Monotonic instant at which the reading was received.
    pub t_ref: Instant,
}

impl Observation {
    pub fn new(detection: Detection, t_ref: Instant) -> Self {
        Self {
            dx: detection.dx,
            dy: detection.dy,
            theta: detection.theta,
            t_ref,
        }
    }

    pub fn detection(&self) -> Detection {
        Detection {
            dx: self.dx,
            dy: self.dy,
            theta: self.theta,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Configuration inputs
// ────────────────────────────────────────────────────────────────────────────

/// Arm and conveyor motion bounds, constant for a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionLimits {
    /// Maximum Cartesian TCP speed of the arm (m/s).
    #[serde(default = "default_v_max")]
    pub v_max: f64,
    /// Maximum Cartesian TCP acceleration of the arm (m/s²).
    #[serde(default = "default_a_max")]
    pub a_max: f64,
    /// Constant speed of the conveyor belt (m/s).
    #[serde(default = "default_v_conveyor")]
    pub v_conveyor: f64,
}

fn default_v_max() -> f64 {
    3.0
}
fn default_a_max() -> f64 {
    5.0
}
fn default_v_conveyor() -> f64 {
    0.02
}

impl Default for MotionLimits {
    fn default() -> Self {
        Self {
            v_max: default_v_max(),
            a_max: default_a_max(),
            v_conveyor: default_v_conveyor(),
        }
    }
}

/// Fixed mounting and target-geometry constants used to turn sensor-frame
/// offsets into arm-frame displacements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    /// Distance from the sensor reference to the arm TCP along the belt (mm).
    pub camera_offset_x_mm: f64,
    /// Nominal target width along the belt (mm).
    pub box_width_mm: f64,
    /// Nominal target height (mm).
    pub box_height_mm: f64,
    /// Vertical clearance between the TCP home height and the belt (mm).
    pub standoff_height_mm: f64,
    /// Fraction of the width added to aim past the leading edge.
    pub width_bias: f64,
    /// Fraction of the height the gripper descends into the target.
    pub height_bias: f64,
    /// Tool tilt about X held during the approach (rad).
    pub approach_tilt_rad: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            camera_offset_x_mm: 185.15,
            box_width_mm: (100.0 + 130.0) / 2.0,
            box_height_mm: (150.0 + 115.0) / 2.0,
            standoff_height_mm: 380.0,
            width_bias: 1.0 / 3.0,
            height_bias: 2.0 / 3.0,
            approach_tilt_rad: -std::f64::consts::FRAC_PI_6,
        }
    }
}

/// Empirical timing constants of the deadline schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Fraction of `t_intercept` at which the gripper starts closing.
    pub grasp_lead_fraction: f64,
    /// How long the lift/retreat velocity command is held (s).
    pub retreat_duration_s: f64,
    /// Upward TCP speed during the retreat (m/s).
    pub retreat_lift_velocity: f64,
    /// Acceleration of the return-to-home move (m/s²).
    pub home_accel: f64,
    /// Speed of the return-to-home move (m/s).
    pub home_velocity: f64,
    /// Absolute pose the arm returns to after a pick.
    pub home_pose: Pose6,
    /// Time after DONE before the next cycle may open the gripper (s).  The
    /// return move is fire-and-forget and still carries the part.
    pub return_settle_s: f64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        let wrist = 128f64.to_radians();
        Self {
            grasp_lead_fraction: 0.625,
            retreat_duration_s: 0.5,
            retreat_lift_velocity: 0.5,
            home_accel: 1.2,
            home_velocity: 0.5,
            home_pose: Pose6::new(0.116, -0.300, 0.08, wrist, wrist, 0.0),
            return_settle_s: 1.5,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Derived artifacts
// ────────────────────────────────────────────────────────────────────────────

/// Time (s, relative to `t_ref`) at which the arm meets the moving target.
///
/// Always finite and strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InterceptSolution {
    t_intercept: f64,
}

impl InterceptSolution {
    /// Wrap a solved intercept time.  Returns `None` for NaN, infinite, zero
    /// or negative values, none of which may serve as a schedule base.
    pub fn new(t_intercept: f64) -> Option<Self> {
        (t_intercept.is_finite() && t_intercept > 0.0).then_some(Self { t_intercept })
    }

    pub fn t_intercept(&self) -> f64 {
        self.t_intercept
    }
}

/// The full command issued to the arm plus the timing reference used for
/// the subsequent deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InterceptPlan {
    /// Displacement applied on top of the current TCP pose.
    pub relative_pose: Pose6,
    /// Commanded TCP acceleration (m/s²).
    pub accel: f64,
    /// Commanded TCP speed (m/s).
    pub vel: f64,
    /// Solved intercept time (s after `t_ref`).
    pub t_intercept: f64,
}

/// States of the deadline schedule, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Init,
    Moving,
    Grasping,
    Arrived,
    Retracting,
    Returning,
    Done,
}

impl Stage {
    /// Every stage in the fixed order the schedule walks through.
    pub const ORDER: [Stage; 7] = [
        Stage::Init,
        Stage::Moving,
        Stage::Grasping,
        Stage::Arrived,
        Stage::Retracting,
        Stage::Returning,
        Stage::Done,
    ];

    /// The stage that follows `self`, or `None` from [`Stage::Done`].
    pub fn next(self) -> Option<Stage> {
        let idx = Self::ORDER.iter().position(|s| *s == self)?;
        Self::ORDER.get(idx + 1).copied()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "INIT",
            Stage::Moving => "MOVING",
            Stage::Grasping => "GRASPING",
            Stage::Arrived => "ARRIVED",
            Stage::Retracting => "RETRACTING",
            Stage::Returning => "RETURNING",
            Stage::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// One collaborator call, as issued by the core.  Simulated drivers record
/// these; real drivers log them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "payload")]
pub enum RigCommand {
    MoveRelative { pose: Pose6, accel: f64, vel: f64 },
    MoveAbsolute { pose: Pose6, accel: f64, vel: f64 },
    SetCartesianVelocity { velocity: [f64; 6], accel: f64, duration_s: f64 },
    Actuate { closed: bool },
    SetConveyorVelocity { mm_per_s: f64 },
    RunConveyor { forward: bool },
    StopConveyor,
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Workspace-wide error type spanning solver failures, device faults,
/// configuration problems and aborted cycles.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RigError {
    #[error("Domain Error: {0}")]
    Domain(String),

    #[error("Unreachable Target: intercept has no positive real solution (radicand {radicand})")]
    UnreachableTarget { radicand: f64 },

    #[error("Collaborator Fault on {component}: {details}")]
    CollaboratorFault { component: String, details: String },

    #[error("Invalid Configuration: {0}")]
    InvalidConfig(String),

    #[error("Observation Timeout: no detection within {0} s")]
    ObservationTimeout(f64),

    #[error("Plan Rejected by {rule}: {details}")]
    PlanRejected { rule: String, details: String },

    #[error("Cycle Cancelled during {stage}")]
    Cancelled { stage: Stage },
}

impl RigError {
    /// Shorthand for a [`RigError::CollaboratorFault`].
    pub fn fault(component: impl Into<String>, details: impl fmt::Display) -> Self {
        RigError::CollaboratorFault {
            component: component.into(),
            details: details.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_is_linear() {
        let mut stage = Stage::Init;
        let mut walked = vec![stage];
        while let Some(next) = stage.next() {
            assert!(next > stage);
            walked.push(next);
            stage = next;
        }
        assert_eq!(walked, Stage::ORDER.to_vec());
        assert_eq!(Stage::Done.next(), None);
    }

    #[test]
    fn stage_display_matches_state_names() {
        assert_eq!(Stage::Grasping.to_string(), "GRASPING");
        assert_eq!(Stage::Done.to_string(), "DONE");
    }

    #[test]
    fn intercept_solution_rejects_non_positive_and_nan() {
        assert!(InterceptSolution::new(0.0).is_none());
        assert!(InterceptSolution::new(-0.3).is_none());
        assert!(InterceptSolution::new(f64::NAN).is_none());
        assert!(InterceptSolution::new(f64::INFINITY).is_none());
        let ok = InterceptSolution::new(0.75).unwrap();
        assert!((ok.t_intercept() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn default_home_pose_uses_radians() {
        let home = ScheduleConfig::default().home_pose;
        assert!((home.rx - 128.0 * std::f64::consts::PI / 180.0).abs() < 1e-12);
        assert!((home.rx - home.ry).abs() < f64::EPSILON);
    }

    #[test]
    fn calibration_defaults_are_nominal_box_means() {
        let cal = Calibration::default();
        assert!((cal.box_width_mm - 115.0).abs() < f64::EPSILON);
        assert!((cal.box_height_mm - 132.5).abs() < f64::EPSILON);
    }

    #[test]
    fn rig_command_roundtrip() {
        let cmd = RigCommand::SetCartesianVelocity {
            velocity: [-0.02, 0.0, 0.5, 0.0, 0.0, 0.0],
            accel: 5.0,
            duration_s: 0.5,
        };
        let json = serde_json::to_string(&cmd).unwrap();
        let back: RigCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(cmd, back);
    }

    #[test]
    fn motion_limits_fill_missing_fields_with_defaults() {
        let limits: MotionLimits = serde_json::from_str(r#"{"v_max": 1.5}"#).unwrap();
        assert!((limits.v_max - 1.5).abs() < f64::EPSILON);
        assert!((limits.a_max - 5.0).abs() < f64::EPSILON);
        assert!((limits.v_conveyor - 0.02).abs() < f64::EPSILON);
    }

    #[test]
    fn rig_error_display() {
        let err = RigError::fault("gripper", "connection reset");
        assert_eq!(err.to_string(), "Collaborator Fault on gripper: connection reset");
        let err = RigError::Cancelled { stage: Stage::Arrived };
        assert!(err.to_string().contains("ARRIVED"));
    }
}
