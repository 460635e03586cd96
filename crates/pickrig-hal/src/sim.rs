//! In-process simulated rig for tests and the `sim` CLI mode.
//!
//! Every simulated driver appends the [`RigCommand`] it receives to one
//! shared [`CommandLog`], stamped with the rig [`Clock`].  Tests can then
//! assert on the cross-device order and timing of the whole cycle without
//! any hardware.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pickrig_hal::sim::SimRig;
//! use pickrig_types::{Detection, SimClock};
//!
//! let clock = Arc::new(SimClock::new(Duration::from_micros(50)));
//! let rig = SimRig::new(clock)
//!     .with_detection(Detection { dx: 5.0, dy: 0.0, theta: 12.0 });
//! let log = rig.log();
//! let mut devices = rig.build();
//!
//! devices.gripper.actuate(true).expect("sim gripper must succeed");
//! assert_eq!(log.len(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pickrig_types::{Clock, Detection, Observation, Pose6, RigCommand, RigError};
use tracing::debug;

use crate::arm::Arm;
use crate::conveyor::{Conveyor, check_conveyor_speed};
use crate::devices::RigDevices;
use crate::gripper::Gripper;
use crate::vision::Vision;

// ────────────────────────────────────────────────────────────────────────────
// Command log
// ────────────────────────────────────────────────────────────────────────────

/// One command as received by a simulated driver.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRecord {
    /// Clock instant at which the driver accepted the command.
    pub at: Instant,
    /// Identifier of the receiving driver.
    pub component: String,
    pub command: RigCommand,
}

/// Shared, clock-stamped record of every simulated command.  Cloning yields
/// another handle onto the same log.
#[derive(Clone)]
pub struct CommandLog {
    clock: Arc<dyn Clock>,
    entries: Arc<Mutex<Vec<CommandRecord>>>,
}

impl CommandLog {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Append `command` stamped with the current clock reading.
    pub fn record(&self, component: &str, command: RigCommand) {
        let at = self.clock.now();
        debug!(component, ?command, "sim command");
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(CommandRecord {
                at,
                component: component.to_string(),
                command,
            });
    }

    /// Snapshot of every record so far, in arrival order.
    pub fn entries(&self) -> Vec<CommandRecord> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Only the commands, in arrival order.
    pub fn commands(&self) -> Vec<RigCommand> {
        self.entries().into_iter().map(|r| r.command).collect()
    }

    /// Records addressed to `component`.
    pub fn for_component(&self, component: &str) -> Vec<CommandRecord> {
        self.entries()
            .into_iter()
            .filter(|r| r.component == component)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn injected_fault(component: &str) -> RigError {
    RigError::fault(component, "injected send failure")
}

// ────────────────────────────────────────────────────────────────────────────
// Stub arm
// ────────────────────────────────────────────────────────────────────────────

/// A simulated arm that records every command.  Fails every call when built
/// with [`SimArm::failing`].
pub struct SimArm {
    id: String,
    log: CommandLog,
    fail: bool,
}

impl SimArm {
    pub fn new(id: impl Into<String>, log: CommandLog) -> Box<Self> {
        Box::new(Self {
            id: id.into(),
            log,
            fail: false,
        })
    }

    /// A simulated arm whose sends always fail (nothing is recorded).
    pub fn failing(id: impl Into<String>, log: CommandLog) -> Box<Self> {
        let mut arm = Self::new(id, log);
        arm.fail = true;
        arm
    }

    fn send(&mut self, command: RigCommand) -> Result<(), RigError> {
        if self.fail {
            return Err(injected_fault(&self.id));
        }
        self.log.record(&self.id, command);
        Ok(())
    }
}

impl Arm for SimArm {
    fn id(&self) -> &str {
        &self.id
    }

    fn move_relative(&mut self, pose: Pose6, accel: f64, vel: f64) -> Result<(), RigError> {
        self.send(RigCommand::MoveRelative { pose, accel, vel })
    }

    fn move_absolute(&mut self, pose: Pose6, accel: f64, vel: f64) -> Result<(), RigError> {
        self.send(RigCommand::MoveAbsolute { pose, accel, vel })
    }

    fn set_cartesian_velocity(
        &mut self,
        velocity: [f64; 6],
        accel: f64,
        duration: Duration,
    ) -> Result<(), RigError> {
        self.send(RigCommand::SetCartesianVelocity {
            velocity,
            accel,
            duration_s: duration.as_secs_f64(),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stub gripper
// ────────────────────────────────────────────────────────────────────────────

/// A simulated gripper that records actuation commands.
pub struct SimGripper {
    id: String,
    log: CommandLog,
    fail: bool,
}

impl SimGripper {
    pub fn new(id: impl Into<String>, log: CommandLog) -> Box<Self> {
        Box::new(Self {
            id: id.into(),
            log,
            fail: false,
        })
    }

    /// A simulated gripper whose sends always fail.
    pub fn failing(id: impl Into<String>, log: CommandLog) -> Box<Self> {
        let mut gripper = Self::new(id, log);
        gripper.fail = true;
        gripper
    }
}

impl Gripper for SimGripper {
    fn id(&self) -> &str {
        &self.id
    }

    fn actuate(&mut self, closed: bool) -> Result<(), RigError> {
        if self.fail {
            return Err(injected_fault(&self.id));
        }
        self.log.record(&self.id, RigCommand::Actuate { closed });
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stub conveyor
// ────────────────────────────────────────────────────────────────────────────

/// A simulated conveyor.  Speed validation matches the real controller.
pub struct SimConveyor {
    id: String,
    log: CommandLog,
    fail: bool,
}

impl SimConveyor {
    pub fn new(id: impl Into<String>, log: CommandLog) -> Box<Self> {
        Box::new(Self {
            id: id.into(),
            log,
            fail: false,
        })
    }

    /// A simulated conveyor whose sends always fail.
    pub fn failing(id: impl Into<String>, log: CommandLog) -> Box<Self> {
        let mut conveyor = Self::new(id, log);
        conveyor.fail = true;
        conveyor
    }

    fn send(&mut self, command: RigCommand) -> Result<(), RigError> {
        if self.fail {
            return Err(injected_fault(&self.id));
        }
        self.log.record(&self.id, command);
        Ok(())
    }
}

impl Conveyor for SimConveyor {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_velocity(&mut self, mm_per_s: f64) -> Result<(), RigError> {
        check_conveyor_speed(mm_per_s)?;
        self.send(RigCommand::SetConveyorVelocity { mm_per_s })
    }

    fn run(&mut self, forward: bool) -> Result<(), RigError> {
        self.send(RigCommand::RunConveyor { forward })
    }

    fn stop(&mut self) -> Result<(), RigError> {
        self.send(RigCommand::StopConveyor)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stub vision
// ────────────────────────────────────────────────────────────────────────────

/// A simulated detector replaying scripted detections, each stamped with the
/// rig clock at the moment it is handed out.
pub struct SimVision {
    id: String,
    clock: Arc<dyn Clock>,
    queue: VecDeque<Detection>,
}

impl SimVision {
    pub fn new(id: impl Into<String>, clock: Arc<dyn Clock>) -> Box<Self> {
        Box::new(Self {
            id: id.into(),
            clock,
            queue: VecDeque::new(),
        })
    }

    /// Queue one detection to be returned by a later
    /// [`Vision::next_detection`] call.
    pub fn push(&mut self, detection: Detection) {
        self.queue.push_back(detection);
    }
}

impl Vision for SimVision {
    fn id(&self) -> &str {
        &self.id
    }

    fn next_detection(&mut self, timeout: Option<Duration>) -> Result<Observation, RigError> {
        match self.queue.pop_front() {
            Some(detection) => Ok(Observation::new(detection, self.clock.now())),
            // An empty script would block forever on real hardware.
            None => match timeout {
                Some(t) => Err(RigError::ObservationTimeout(t.as_secs_f64())),
                None => Err(RigError::fault(&self.id, "no detection scripted")),
            },
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimRig builder
// ────────────────────────────────────────────────────────────────────────────

/// Builder for a fully simulated [`RigDevices`] bundle sharing one
/// [`CommandLog`].
///
/// Grab the log with [`SimRig::log`] before calling [`SimRig::build`].
pub struct SimRig {
    clock: Arc<dyn Clock>,
    log: CommandLog,
    detections: Vec<Detection>,
    failing_arm: bool,
    failing_gripper: bool,
    failing_conveyor: bool,
}

impl SimRig {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            log: CommandLog::new(clock.clone()),
            clock,
            detections: Vec::new(),
            failing_arm: false,
            failing_gripper: false,
            failing_conveyor: false,
        }
    }

    /// Script a detection for the simulated vision link.
    pub fn with_detection(mut self, detection: Detection) -> Self {
        self.detections.push(detection);
        self
    }

    /// Make every arm send fail.
    pub fn with_failing_arm(mut self) -> Self {
        self.failing_arm = true;
        self
    }

    /// Make every gripper send fail.
    pub fn with_failing_gripper(mut self) -> Self {
        self.failing_gripper = true;
        self
    }

    /// Make every conveyor send fail.
    pub fn with_failing_conveyor(mut self) -> Self {
        self.failing_conveyor = true;
        self
    }

    /// Handle onto the log the built drivers will write to.
    pub fn log(&self) -> CommandLog {
        self.log.clone()
    }

    /// Consume the builder and return the simulated device bundle.
    pub fn build(self) -> RigDevices {
        let arm: Box<dyn Arm> = if self.failing_arm {
            SimArm::failing("arm", self.log.clone())
        } else {
            SimArm::new("arm", self.log.clone())
        };
        let gripper: Box<dyn Gripper> = if self.failing_gripper {
            SimGripper::failing("gripper", self.log.clone())
        } else {
            SimGripper::new("gripper", self.log.clone())
        };
        let conveyor: Box<dyn Conveyor> = if self.failing_conveyor {
            SimConveyor::failing("conveyor", self.log.clone())
        } else {
            SimConveyor::new("conveyor", self.log.clone())
        };
        let mut vision = SimVision::new("vision", self.clock);
        for detection in self.detections {
            vision.push(detection);
        }
        RigDevices::new(arm, gripper, conveyor, vision)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pickrig_types::SimClock;

    fn clock() -> Arc<SimClock> {
        Arc::new(SimClock::frozen())
    }

    #[test]
    fn sim_rig_records_commands_in_order() {
        let clock = clock();
        let rig = SimRig::new(clock.clone());
        let log = rig.log();
        let mut devices = rig.build();

        devices.conveyor.set_velocity(20.0).unwrap();
        devices.conveyor.run(true).unwrap();
        clock.advance(Duration::from_millis(10));
        devices.gripper.actuate(true).unwrap();
        devices.conveyor.stop().unwrap();

        assert_eq!(
            log.commands(),
            vec![
                RigCommand::SetConveyorVelocity { mm_per_s: 20.0 },
                RigCommand::RunConveyor { forward: true },
                RigCommand::Actuate { closed: true },
                RigCommand::StopConveyor,
            ]
        );
        let entries = log.entries();
        assert_eq!(entries[2].at - entries[0].at, Duration::from_millis(10));
        assert_eq!(log.for_component("conveyor").len(), 3);
    }

    #[test]
    fn sim_arm_records_cartesian_velocity_duration() {
        let log = CommandLog::new(clock());
        let mut arm = SimArm::new("arm", log.clone());
        arm.set_cartesian_velocity([0.0, 0.0, 0.5, 0.0, 0.0, 0.0], 5.0, Duration::from_millis(500))
            .unwrap();
        match &log.commands()[0] {
            RigCommand::SetCartesianVelocity { duration_s, .. } => {
                assert!((duration_s - 0.5).abs() < f64::EPSILON)
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn failing_drivers_record_nothing() {
        let rig = SimRig::new(clock())
            .with_failing_arm()
            .with_failing_gripper()
            .with_failing_conveyor();
        let log = rig.log();
        let mut devices = rig.build();

        assert!(devices.arm.move_absolute(Pose6::default(), 1.0, 1.0).is_err());
        assert!(devices.gripper.actuate(true).is_err());
        assert!(devices.conveyor.stop().is_err());
        assert!(log.is_empty());
    }

    #[test]
    fn sim_conveyor_rejects_out_of_range_speed() {
        let log = CommandLog::new(clock());
        let mut conveyor = SimConveyor::new("conveyor", log.clone());
        let err = conveyor.set_velocity(250.0).unwrap_err();
        assert!(matches!(err, RigError::InvalidConfig(_)));
        assert!(log.is_empty());
    }

    #[test]
    fn sim_vision_stamps_with_rig_clock() {
        let clock = clock();
        clock.advance(Duration::from_millis(42));
        let mut vision = SimVision::new("vision", clock.clone());
        vision.push(Detection {
            dx: 1.0,
            dy: 2.0,
            theta: 3.0,
        });
        let obs = vision.next_detection(None).unwrap();
        assert_eq!(obs.t_ref - clock.origin(), Duration::from_millis(42));
        assert!((obs.theta - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sim_vision_empty_script_times_out() {
        let mut vision = SimVision::new("vision", clock());
        let err = vision
            .next_detection(Some(Duration::from_secs(2)))
            .unwrap_err();
        assert_eq!(err, RigError::ObservationTimeout(2.0));
        assert!(matches!(
            vision.next_detection(None),
            Err(RigError::CollaboratorFault { .. })
        ));
    }
}
