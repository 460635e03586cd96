//! `Gripper` capability for a two-state end effector.

use pickrig_types::RigError;

/// An open/close gripper.
///
/// Drivers implement this trait and are bundled into a
/// [`RigDevices`][crate::devices::RigDevices].
pub trait Gripper: Send + Sync {
    /// Stable identifier, e.g. `"gripper"`.
    fn id(&self) -> &str;

    /// Close (`true`) or open (`false`) the gripper.
    ///
    /// Acknowledgment from the device is optional; drivers log a missing
    /// acknowledgment instead of blocking on it.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::CollaboratorFault`] if the command could not be
    /// sent.
    fn actuate(&mut self, closed: bool) -> Result<(), RigError>;
}
