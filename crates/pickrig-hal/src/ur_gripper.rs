//! [`UrGripper`] – adaptive gripper on its ASCII socket interface.
//!
//! The gripper speaks `GET <VAR>` / `SET <VAR> <value>` lines and answers
//! `SET` commands with `ack`.  Activation reads every reply in lockstep.
//! After that, acknowledgments are polled without blocking so that actuation
//! stays fire-and-forget inside the timed schedule; replies that arrive late
//! are drained before the next command and logged against the command they
//! answer.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use pickrig_types::RigError;
use tracing::{debug, info, warn};

use crate::gripper::Gripper;

/// Default port of the gripper socket server.
pub const GRIPPER_PORT: u16 = 63352;

/// Upper bound on each blocking reply read during activation.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// An adaptive gripper reached over TCP.
pub struct UrGripper {
    id: String,
    stream: TcpStream,
    /// Last `SET POS` whose acknowledgment has not been seen yet.
    unacked: Option<String>,
}

impl UrGripper {
    /// Connect, activate the gripper if needed, set full speed and force and
    /// leave it open.
    ///
    /// `settle` is how long the gripper is given to finish its activation
    /// sweep.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::CollaboratorFault`] when the connection or any
    /// handshake step fails.
    pub fn connect(addr: impl ToSocketAddrs, settle: Duration) -> Result<Self, RigError> {
        let stream = TcpStream::connect(addr).map_err(|e| RigError::fault("gripper", e))?;
        stream
            .set_nodelay(true)
            .map_err(|e| RigError::fault("gripper", e))?;
        stream
            .set_read_timeout(Some(HANDSHAKE_TIMEOUT))
            .map_err(|e| RigError::fault("gripper", e))?;
        let mut gripper = Self {
            id: "gripper".to_string(),
            stream,
            unacked: None,
        };
        gripper.activate(settle)?;
        gripper
            .stream
            .set_read_timeout(None)
            .map_err(|e| RigError::fault("gripper", e))?;
        Ok(gripper)
    }

    fn activate(&mut self, settle: Duration) -> Result<(), RigError> {
        self.send("GET ACT\n")?;
        let act = self.read_reply(10)?;
        if !act.contains('1') {
            warn!(reply = %act.trim(), "gripper not activated");
        }

        self.send("GET POS\n")?;
        let pos = self.read_reply(10)?;
        if pos.is_empty() {
            return Ok(());
        }

        self.send("SET ACT 1\n")?;
        let reply = self.read_reply(255)?;
        debug!(reply = %reply.trim(), "activation requested");
        std::thread::sleep(settle);

        for command in ["SET GTO 1", "SET SPE 255", "SET FOR 255", "SET POS 0"] {
            self.send(&format!("{command}\n"))?;
            let reply = self.read_reply(10)?;
            if !reply.contains("ack") {
                warn!(command, reply = %reply.trim(), "gripper did not acknowledge");
            }
        }
        info!("gripper activated");
        Ok(())
    }

    fn send(&mut self, line: &str) -> Result<(), RigError> {
        self.stream
            .write_all(line.as_bytes())
            .map_err(|e| RigError::fault(&self.id, e))
    }

    fn read_reply(&mut self, max: usize) -> Result<String, RigError> {
        let mut buf = vec![0u8; max];
        let n = self
            .stream
            .read(&mut buf)
            .map_err(|e| RigError::fault(&self.id, e))?;
        Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
    }

    /// Read whatever replies are already buffered, without blocking.
    fn drain_replies(&mut self) -> String {
        let mut drained = Vec::new();
        if let Err(e) = self.stream.set_nonblocking(true) {
            warn!(error = %e, "gripper reply poll unavailable");
            return String::new();
        }
        let mut buf = [0u8; 64];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => drained.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(error = %e, "gripper reply read failed");
                    break;
                }
            }
        }
        if let Err(e) = self.stream.set_nonblocking(false) {
            warn!(error = %e, "failed to restore blocking gripper socket");
        }
        String::from_utf8_lossy(&drained).into_owned()
    }

    /// Attribute buffered replies to the outstanding command.  A missing
    /// `ack` is only logged.
    fn settle_replies(&mut self) {
        let replies = self.drain_replies();
        let Some(command) = self.unacked.as_deref() else {
            if !replies.trim().is_empty() {
                warn!(reply = %replies.trim(), "unsolicited gripper reply");
            }
            return;
        };
        if replies.contains("ack") {
            debug!(command, "gripper ack");
            self.unacked = None;
        } else if replies.trim().is_empty() {
            debug!(command, "gripper ack pending");
        } else {
            warn!(command, reply = %replies.trim(), "gripper did not acknowledge");
            self.unacked = None;
        }
    }
}

impl Gripper for UrGripper {
    fn id(&self) -> &str {
        &self.id
    }

    fn actuate(&mut self, closed: bool) -> Result<(), RigError> {
        self.settle_replies();
        if let Some(stale) = self.unacked.take() {
            warn!(command = %stale, "gripper never acknowledged");
        }
        let command = format!("SET POS {}", if closed { 255 } else { 0 });
        self.send(&format!("{command}\n"))?;
        self.unacked = Some(command);
        self.settle_replies();
        Ok(())
    }
}
