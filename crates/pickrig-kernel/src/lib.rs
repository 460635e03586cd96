//! `pickrig-kernel` – Timing & Safety
//!
//! Everything between a finished plan and the devices: the plan is checked,
//! turned into a deadline schedule and executed open-loop against the rig
//! clock.
//!
//! # Modules
//!
//! - [`cancel`] – [`CancelToken`][cancel::CancelToken]: cooperative abort
//!   flag polled by every spin-wait iteration.
//! - [`spin_wait`] – [`spin_until`][spin_wait::spin_until]: busy-polling
//!   deadline primitive measured from `t_ref`.
//! - [`schedule`] – [`DeadlineSchedule`][schedule::DeadlineSchedule]: the
//!   ordered stage deadlines derived from an
//!   [`InterceptPlan`][pickrig_types::InterceptPlan].
//! - [`synchronizer`] – [`MotionSynchronizer`][synchronizer::MotionSynchronizer]:
//!   walks the schedule and fires each stage's collaborator command.
//! - [`plan_verifier`] – [`PlanVerifier`][plan_verifier::PlanVerifier]:
//!   rule engine that rejects plans no open-loop approach should attempt.

pub mod cancel;
pub mod plan_verifier;
pub mod schedule;
pub mod spin_wait;
pub mod synchronizer;

pub use cancel::CancelToken;
pub use plan_verifier::{InterceptWindowRule, PlanVerifier, ReachRule, Rule};
pub use schedule::{DeadlineSchedule, ScheduledStage};
pub use spin_wait::{Wait, spin_until};
pub use synchronizer::{MotionSynchronizer, StageFault, StageTransition, SyncReport, SyncStatus};
