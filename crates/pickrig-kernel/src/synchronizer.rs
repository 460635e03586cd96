//! [`MotionSynchronizer`] – executes one [`DeadlineSchedule`].
//!
//! All deadlines are measured from the observation timestamp `t_ref`, not
//! from when the synchronizer starts, so time spent planning eats into the
//! approach instead of shifting the grasp.
//!
//! ```text
//! INIT ─► MOVING ─► GRASPING ─► ARRIVED ─► RETRACTING ─► RETURNING ─► DONE
//!           │          │                        │             │          │
//!      move_relative  close              set_cartesian   move_absolute  stop
//!                     gripper               velocity        (home)     conveyor
//! ```
//!
//! A device fault inside the schedule is logged and recorded in
//! [`SyncReport::faults`]; the schedule keeps going because the arm is
//! already in motion and the later stages are what bring it home.  A
//! cancelled [`CancelToken`] stops the walk before the next stage's command.

use std::time::{Duration, Instant};

use pickrig_hal::MotionDevices;
use pickrig_types::{Clock, InterceptPlan, MotionLimits, RigError, ScheduleConfig, Stage};
use serde::Serialize;
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::schedule::DeadlineSchedule;
use crate::spin_wait::{Wait, spin_until};

/// Release later than this past a gated deadline is reported as a miss.
pub const LATE_TOLERANCE: Duration = Duration::from_millis(1);

/// How a schedule run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncStatus {
    Completed,
    /// Cancelled while `during` was the current stage; no later stage's
    /// command was issued.
    Aborted { during: Stage },
}

/// A stage entered, with the time since `t_ref` at entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StageTransition {
    pub stage: Stage,
    pub elapsed: Duration,
}

/// A collaborator error raised while executing `stage`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageFault {
    pub stage: Stage,
    pub error: RigError,
}

/// Outcome of [`MotionSynchronizer::run`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub status: SyncStatus,
    pub transitions: Vec<StageTransition>,
    pub faults: Vec<StageFault>,
}

impl SyncReport {
    /// The most recently entered stage.
    pub fn current_stage(&self) -> Stage {
        self.transitions.last().map_or(Stage::Init, |t| t.stage)
    }

    /// Stages entered, in order.
    pub fn stages(&self) -> Vec<Stage> {
        self.transitions.iter().map(|t| t.stage).collect()
    }

    pub fn is_completed(&self) -> bool {
        self.status == SyncStatus::Completed
    }
}

/// Walks the stage machine for one plan.
#[derive(Debug, Clone, Copy)]
pub struct MotionSynchronizer {
    config: ScheduleConfig,
    limits: MotionLimits,
}

impl MotionSynchronizer {
    pub fn new(config: ScheduleConfig, limits: MotionLimits) -> Self {
        Self { config, limits }
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// Execute the schedule for `plan` against `devices`.
    ///
    /// # Errors
    ///
    /// Only when no schedule can be derived from `plan` (see
    /// [`DeadlineSchedule::from_plan`]); in that case no device has been
    /// commanded.  Faults and cancellation after that point are reported
    /// through the returned [`SyncReport`].
    pub fn run(
        &self,
        plan: &InterceptPlan,
        t_ref: Instant,
        devices: MotionDevices<'_>,
        clock: &dyn Clock,
        cancel: &CancelToken,
    ) -> Result<SyncReport, RigError> {
        let schedule = DeadlineSchedule::from_plan(plan, &self.config)?;
        let MotionDevices {
            arm,
            gripper,
            conveyor,
        } = devices;

        let mut report = SyncReport {
            status: SyncStatus::Completed,
            transitions: vec![StageTransition {
                stage: Stage::Init,
                elapsed: clock.elapsed_since(t_ref),
            }],
            faults: Vec::new(),
        };

        for entry in schedule.entries() {
            let elapsed = match spin_until(clock, t_ref, entry.at, cancel) {
                Wait::Released(elapsed) => elapsed,
                Wait::Cancelled => {
                    let during = report.current_stage();
                    warn!(%during, pending = %entry.stage, "schedule cancelled");
                    report.status = SyncStatus::Aborted { during };
                    return Ok(report);
                }
            };

            if entry.gated && elapsed > entry.at + LATE_TOLERANCE {
                warn!(
                    stage = %entry.stage,
                    late_ms = (elapsed - entry.at).as_secs_f64() * 1e3,
                    "deadline missed, firing immediately"
                );
            }
            info!(
                stage = %entry.stage,
                elapsed_ms = elapsed.as_secs_f64() * 1e3,
                "stage entered"
            );
            report.transitions.push(StageTransition {
                stage: entry.stage,
                elapsed,
            });

            let result = match entry.stage {
                Stage::Moving => arm.move_relative(plan.relative_pose, plan.accel, plan.vel),
                Stage::Grasping => gripper.actuate(true),
                Stage::Retracting => arm.set_cartesian_velocity(
                    [
                        -self.limits.v_conveyor,
                        0.0,
                        self.config.retreat_lift_velocity,
                        0.0,
                        0.0,
                        0.0,
                    ],
                    self.limits.a_max,
                    schedule.retreat(),
                ),
                Stage::Returning => arm.move_absolute(
                    self.config.home_pose,
                    self.config.home_accel,
                    self.config.home_velocity,
                ),
                Stage::Done => conveyor.stop(),
                Stage::Init | Stage::Arrived => Ok(()),
            };
            if let Err(error) = result {
                warn!(stage = %entry.stage, %error, "stage command failed, continuing");
                report.faults.push(StageFault {
                    stage: entry.stage,
                    error,
                });
            }
        }

        Ok(report)
    }
}
