//! `pickrig-hal` – collaborator capabilities and their drivers.
//!
//! The core only ever talks to the four capability traits below, so the real
//! TCP drivers and the in-process simulation are interchangeable.
//!
//! # Modules
//!
//! - [`arm`] – [`Arm`][arm::Arm]: relative/absolute linear moves and
//!   Cartesian velocity commands.
//! - [`gripper`] – [`Gripper`][gripper::Gripper]: open/close actuation.
//! - [`conveyor`] – [`Conveyor`][conveyor::Conveyor]: belt speed and jog.
//! - [`vision`] – [`Vision`][vision::Vision]: blocking wait for one
//!   timestamped detection.
//! - [`devices`] – [`RigDevices`][devices::RigDevices]: the owned bundle of
//!   all four drivers handed to the runtime.
//! - [`sim`] – recording test doubles sharing a
//!   [`CommandLog`][sim::CommandLog].
//! - [`urscript`], [`ur_arm`], [`ur_gripper`], [`ur_conveyor`],
//!   [`vision_link`] – TCP drivers for the physical rig.

pub mod arm;
pub mod conveyor;
pub mod devices;
pub mod gripper;
pub mod sim;
pub mod ur_arm;
pub mod ur_conveyor;
pub mod ur_gripper;
pub mod urscript;
pub mod vision;
pub mod vision_link;

pub use arm::Arm;
pub use conveyor::{CONVEYOR_SPEED_RANGE_MM_S, Conveyor, check_conveyor_speed};
pub use devices::{MotionDevices, RigDevices};
pub use gripper::Gripper;
pub use vision::Vision;
