//! [`UrArm`] – Universal Robots arm over the realtime URScript port.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use pickrig_types::{Pose6, RigError};
use tracing::{debug, info};

use crate::arm::Arm;
use crate::urscript;

/// Default URScript realtime port.
pub const UR_REALTIME_PORT: u16 = 30003;

/// Acceleration and speed URScript uses when a move leaves them implicit.
const DEFAULT_ACCEL: f64 = 1.2;
const DEFAULT_VEL: f64 = 0.5;

/// A UR arm driven by raw URScript statements.
pub struct UrArm {
    id: String,
    stream: TcpStream,
}

impl UrArm {
    /// Connect to the controller at `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::CollaboratorFault`] when the connection fails.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, RigError> {
        let stream = TcpStream::connect(addr).map_err(|e| RigError::fault("ur_arm", e))?;
        // Motion commands are tiny; never let Nagle hold one back.
        stream
            .set_nodelay(true)
            .map_err(|e| RigError::fault("ur_arm", e))?;
        if let Ok(peer) = stream.peer_addr() {
            info!(%peer, "connected to arm");
        }
        Ok(Self {
            id: "ur_arm".to_string(),
            stream,
        })
    }

    /// Command the arm to `home` and give it `settle` to get there.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::CollaboratorFault`] when the move cannot be sent.
    pub fn go_home(&mut self, home: Pose6, settle: Duration) -> Result<(), RigError> {
        self.move_absolute(home, DEFAULT_ACCEL, DEFAULT_VEL)?;
        std::thread::sleep(settle);
        Ok(())
    }

    fn send(&mut self, script: &str) -> Result<(), RigError> {
        debug!(script = script.trim_end(), "urscript");
        self.stream
            .write_all(script.as_bytes())
            .map_err(|e| RigError::fault(&self.id, e))
    }

    fn read_packet(&mut self) -> Result<Vec<u8>, RigError> {
        let mut packet = vec![0u8; urscript::REALTIME_PACKET_LEN];
        self.stream
            .read_exact(&mut packet)
            .map_err(|e| RigError::fault(&self.id, e))?;
        Ok(packet)
    }

    /// Current TCP pose as reported by the controller.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::CollaboratorFault`] on transport errors.
    pub fn actual_tcp_pose(&mut self) -> Result<Pose6, RigError> {
        self.send("get_actual_tcp_pose()\n")?;
        let packet = self.read_packet()?;
        urscript::parse_tcp_pose(&packet)
            .ok_or_else(|| RigError::fault(&self.id, "short realtime packet"))
    }

    /// Current joint positions (rad) as reported by the controller.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::CollaboratorFault`] on transport errors.
    pub fn actual_joint_positions(&mut self) -> Result<[f64; 6], RigError> {
        self.send("get_actual_joint_positions()\n")?;
        let packet = self.read_packet()?;
        urscript::parse_joint_positions(&packet)
            .ok_or_else(|| RigError::fault(&self.id, "short realtime packet"))
    }
}

impl Arm for UrArm {
    fn id(&self) -> &str {
        &self.id
    }

    fn move_relative(&mut self, pose: Pose6, accel: f64, vel: f64) -> Result<(), RigError> {
        let script = urscript::movel(&urscript::relative_pose(&pose), accel, vel, 0.0, 0.0);
        self.send(&script)
    }

    fn move_absolute(&mut self, pose: Pose6, accel: f64, vel: f64) -> Result<(), RigError> {
        let script = urscript::movel(&urscript::pose_literal(&pose), accel, vel, 0.0, 0.0);
        self.send(&script)
    }

    fn set_cartesian_velocity(
        &mut self,
        velocity: [f64; 6],
        accel: f64,
        duration: Duration,
    ) -> Result<(), RigError> {
        let script = urscript::speedl(&velocity, accel, duration.as_secs_f64());
        self.send(&script)
    }
}
