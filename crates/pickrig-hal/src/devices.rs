//! [`RigDevices`] – the owned set of collaborators for one rig.
//!
//! The runtime owns exactly one bundle.  The synchronizer only needs the
//! motion side, so it borrows a [`MotionDevices`] view and can never touch
//! the vision link mid-schedule.

use crate::arm::Arm;
use crate::conveyor::Conveyor;
use crate::gripper::Gripper;
use crate::vision::Vision;

/// Owned arm, gripper, conveyor and vision drivers.
pub struct RigDevices {
    pub arm: Box<dyn Arm>,
    pub gripper: Box<dyn Gripper>,
    pub conveyor: Box<dyn Conveyor>,
    pub vision: Box<dyn Vision>,
}

impl RigDevices {
    pub fn new(
        arm: Box<dyn Arm>,
        gripper: Box<dyn Gripper>,
        conveyor: Box<dyn Conveyor>,
        vision: Box<dyn Vision>,
    ) -> Self {
        Self {
            arm,
            gripper,
            conveyor,
            vision,
        }
    }

    /// Borrow the devices the deadline schedule drives.
    pub fn motion(&mut self) -> MotionDevices<'_> {
        MotionDevices {
            arm: self.arm.as_mut(),
            gripper: self.gripper.as_mut(),
            conveyor: self.conveyor.as_mut(),
        }
    }
}

/// Mutable borrow of the devices commanded during the timed schedule.
pub struct MotionDevices<'a> {
    pub arm: &'a mut dyn Arm,
    pub gripper: &'a mut dyn Gripper,
    pub conveyor: &'a mut dyn Conveyor,
}
