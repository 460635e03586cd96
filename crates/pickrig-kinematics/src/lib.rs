//! `pickrig-kinematics` – intercept math.
//!
//! Pure functions only: nothing in this crate talks to a device, so a failed
//! solve can never leave a half-issued command behind.
//!
//! # Modules
//!
//! - [`intercept`] – [`solve_intercept_time`][intercept::solve_intercept_time]:
//!   closed-form time at which the arm meets a target drifting at constant
//!   conveyor speed.
//! - [`planner`] – [`InterceptPlanner`][planner::InterceptPlanner]: turns a
//!   sensor-frame [`Observation`][pickrig_types::Observation] into the arm's
//!   relative-pose command and intercept time.

pub mod intercept;
pub mod planner;

pub use intercept::{intercept_radicand, solve_intercept_time};
pub use planner::InterceptPlanner;
