//! [`RigMotionController`] – one pick cycle, end to end.
//!
//! Each call to [`RigMotionController::run_cycle`]:
//!
//! 1. **Pre-flight** – once the previous cycle's return move has had
//!    `return_settle_s` to finish, open the gripper, set the belt speed and
//!    start the feed.  Any failure here aborts before the arm is touched.
//! 2. **Observe** – drop stale detections, then wait for a fresh one in
//!    [`VISION_POLL`] slices so cancellation is seen during the wait.  Its
//!    receipt instant becomes `t_ref` for every deadline that follows.
//! 3. **Plan** – solve the intercept with [`InterceptPlanner`].
//! 4. **Verify** – pass the plan through the [`PlanVerifier`].
//! 5. **Execute** – hand the plan to the [`MotionSynchronizer`].
//!
//! Steps 2–4 never command the arm: an unreachable or rejected target ends
//! the cycle with an error and the belt stopped.  `run_cycle` takes
//! `&mut self`, so two cycles can never overlap on the same devices.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use pickrig_hal::RigDevices;
use pickrig_kernel::{
    CancelToken, MotionSynchronizer, PlanVerifier, SyncReport, SyncStatus, Wait, spin_until,
};
use pickrig_kinematics::InterceptPlanner;
use pickrig_types::{
    Calibration, Clock, Detection, InterceptPlan, MotionLimits, Observation, RigError,
    ScheduleConfig, Stage,
};
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Longest single read of the vision link; cancellation is checked between
/// reads.
pub const VISION_POLL: Duration = Duration::from_millis(100);

/// Everything the controller needs besides the devices and the clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerConfig {
    pub limits: MotionLimits,
    pub calibration: Calibration,
    pub schedule: ScheduleConfig,
    /// Plans intercepting later than this are rejected.
    pub max_intercept_s: f64,
    /// Relative moves longer than this are rejected.
    pub max_reach_m: f64,
    /// How long to wait for a detection; `None` waits forever.  Counted in
    /// [`VISION_POLL`] slices.
    pub observation_timeout: Option<Duration>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            limits: MotionLimits::default(),
            calibration: Calibration::default(),
            schedule: ScheduleConfig::default(),
            max_intercept_s: 5.0,
            max_reach_m: 1.3,
            observation_timeout: Some(Duration::from_secs(30)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Report
// ─────────────────────────────────────────────────────────────────────────────

/// Record of one executed cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub detection: Detection,
    /// Receipt instant of the detection; origin of every deadline.
    #[serde(skip)]
    pub t_ref: Instant,
    pub plan: InterceptPlan,
    pub sync: SyncReport,
}

impl CycleReport {
    pub fn is_completed(&self) -> bool {
        self.sync.is_completed()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RigMotionController
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the rig's devices and runs pick cycles on them one at a time.
pub struct RigMotionController {
    config: ControllerConfig,
    devices: RigDevices,
    clock: Arc<dyn Clock>,
    planner: InterceptPlanner,
    verifier: PlanVerifier,
    synchronizer: MotionSynchronizer,
    /// DONE instant of the last executed schedule.
    last_done: Option<Instant>,
}

impl RigMotionController {
    pub fn new(config: ControllerConfig, devices: RigDevices, clock: Arc<dyn Clock>) -> Self {
        Self {
            planner: InterceptPlanner::new(config.calibration, config.limits),
            verifier: PlanVerifier::with_limits(config.max_intercept_s, config.max_reach_m),
            synchronizer: MotionSynchronizer::new(config.schedule, config.limits),
            last_done: None,
            config,
            devices,
            clock,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Replace the plan verifier, e.g. to register site-specific rules.
    pub fn with_verifier(mut self, verifier: PlanVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    /// Run one complete cycle.
    ///
    /// # Errors
    ///
    /// - [`RigError::CollaboratorFault`] when pre-flight or the vision link
    ///   fails.
    /// - [`RigError::ObservationTimeout`] when no detection arrives in time.
    /// - [`RigError::Domain`], [`RigError::UnreachableTarget`] or
    ///   [`RigError::PlanRejected`] when no acceptable plan exists.
    /// - [`RigError::Cancelled`] when `cancel` fires before the schedule
    ///   starts, including during the return settle and the vision wait.  Cancellation inside the schedule is reported through
    ///   [`SyncStatus::Aborted`] in an `Ok` report instead.
    pub fn run_cycle(&mut self, cancel: &CancelToken) -> Result<CycleReport, RigError> {
        let id = Uuid::new_v4();
        let started_at = Utc::now();
        let span = info_span!("cycle", %id);
        let _enter = span.enter();

        if cancel.is_cancelled() {
            return Err(RigError::Cancelled { stage: Stage::Init });
        }
        self.await_return(cancel)?;

        if let Err(e) = self.preflight() {
            error!(error = %e, "pre-flight failed, cycle aborted");
            self.halt_feed();
            return Err(e);
        }

        let (observation, plan) = match self.observe_and_plan(cancel) {
            Ok(ok) => ok,
            Err(e) => {
                error!(error = %e, "cycle aborted before motion");
                self.halt_feed();
                return Err(e);
            }
        };

        let sync = match self.synchronizer.run(
            &plan,
            observation.t_ref,
            self.devices.motion(),
            self.clock.as_ref(),
            cancel,
        ) {
            Ok(sync) => {
                self.last_done = Some(self.clock.now());
                sync
            }
            Err(e) => {
                error!(error = %e, "schedule could not be built");
                self.halt_feed();
                return Err(e);
            }
        };

        match sync.status {
            SyncStatus::Completed => info!(
                faults = sync.faults.len(),
                t_intercept = plan.t_intercept,
                "cycle complete"
            ),
            SyncStatus::Aborted { during } => {
                error!(%during, "cycle cancelled mid-schedule");
                self.halt_feed();
            }
        }

        Ok(CycleReport {
            id,
            started_at,
            detection: observation.detection(),
            t_ref: observation.t_ref,
            plan,
            sync,
        })
    }

    /// Hold off until the previous return move has had time to finish; the
    /// arm may still be carrying the part.
    fn await_return(&self, cancel: &CancelToken) -> Result<(), RigError> {
        let Some(done) = self.last_done else {
            return Ok(());
        };
        let settle = Duration::try_from_secs_f64(self.config.schedule.return_settle_s)
            .map_err(|e| RigError::InvalidConfig(format!("return_settle_s: {e}")))?;
        match spin_until(self.clock.as_ref(), done, settle, cancel) {
            Wait::Released(since_done) => {
                debug!(?since_done, "return move settled");
                Ok(())
            }
            Wait::Cancelled => Err(RigError::Cancelled { stage: Stage::Init }),
        }
    }

    fn preflight(&mut self) -> Result<(), RigError> {
        let mm_per_s = self.config.limits.v_conveyor * 1000.0;
        self.devices.gripper.actuate(false)?;
        self.devices.conveyor.set_velocity(mm_per_s)?;
        self.devices.conveyor.run(true)?;
        info!(mm_per_s, "feed running");
        Ok(())
    }

    fn observe_and_plan(
        &mut self,
        cancel: &CancelToken,
    ) -> Result<(Observation, InterceptPlan), RigError> {
        let observation = self.await_detection(cancel)?;
        info!(
            dx = observation.dx,
            dy = observation.dy,
            theta = observation.theta,
            "detection received"
        );

        let plan = self.planner.plan(&observation)?;
        self.verifier.verify(&plan)?;

        if cancel.is_cancelled() {
            return Err(RigError::Cancelled { stage: Stage::Init });
        }
        Ok((observation, plan))
    }

    /// Wait for a fresh detection in [`VISION_POLL`] slices, checking
    /// `cancel` between them.
    fn await_detection(&mut self, cancel: &CancelToken) -> Result<Observation, RigError> {
        let discarded = self.devices.vision.discard_stale()?;
        if discarded > 0 {
            warn!(discarded, "stale detections dropped before waiting");
        }

        let budget = self.config.observation_timeout;
        let mut waited = Duration::ZERO;
        loop {
            if cancel.is_cancelled() {
                return Err(RigError::Cancelled { stage: Stage::Init });
            }
            let slice = budget.map_or(VISION_POLL, |b| VISION_POLL.min(b.saturating_sub(waited)));
            match self.devices.vision.next_detection(Some(slice)) {
                Err(RigError::ObservationTimeout(_)) => {
                    waited += slice;
                    if let Some(b) = budget.filter(|b| waited >= *b) {
                        return Err(RigError::ObservationTimeout(b.as_secs_f64()));
                    }
                }
                other => return other,
            }
        }
    }

    /// Best-effort belt stop after an aborted cycle.
    fn halt_feed(&mut self) {
        if let Err(e) = self.devices.conveyor.stop() {
            warn!(error = %e, "could not stop conveyor");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pickrig_hal::sim::SimRig;
    use pickrig_types::{RigCommand, SimClock};

    fn rig(detections: &[Detection]) -> (RigMotionController, pickrig_hal::sim::CommandLog) {
        let clock = Arc::new(SimClock::new(Duration::from_micros(100)));
        let mut sim = SimRig::new(clock.clone());
        for d in detections {
            sim = sim.with_detection(*d);
        }
        let log = sim.log();
        let controller = RigMotionController::new(ControllerConfig::default(), sim.build(), clock);
        (controller, log)
    }

    #[test]
    fn preflight_opens_gripper_and_starts_feed() {
        let (mut controller, log) = rig(&[Detection {
            dx: 5.0,
            dy: -10.0,
            theta: 12.0,
        }]);
        controller.run_cycle(&CancelToken::new()).unwrap();

        let commands = log.commands();
        assert_eq!(commands[0], RigCommand::Actuate { closed: false });
        assert_eq!(commands[1], RigCommand::SetConveyorVelocity { mm_per_s: 20.0 });
        assert_eq!(commands[2], RigCommand::RunConveyor { forward: true });
    }

    #[test]
    fn cancelled_before_start_commands_nothing() {
        let (mut controller, log) = rig(&[]);
        let token = CancelToken::new();
        token.cancel();
        let err = controller.run_cycle(&token).unwrap_err();
        assert_eq!(err, RigError::Cancelled { stage: Stage::Init });
        assert!(log.is_empty());
    }

    #[test]
    fn report_serializes_without_instant() {
        let (mut controller, _log) = rig(&[Detection {
            dx: 0.0,
            dy: 0.0,
            theta: 0.0,
        }]);
        let report = controller.run_cycle(&CancelToken::new()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["id"], report.id.to_string());
        assert!(json.get("t_ref").is_none());
        assert!(json["plan"]["t_intercept"].as_f64().unwrap() > 0.0);
    }
}
