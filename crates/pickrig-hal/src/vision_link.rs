//! [`VisionLink`] – TCP client for a vision system that pushes detections.
//!
//! Each detection arrives as one UTF-8 frame `dx|dy|theta` terminated by
//! `\n`; an unterminated last frame is accepted when the peer closes.  The
//! socket is a byte stream, so a frame may be split across reads or several
//! may arrive together.  Bytes are collected until the terminator and the
//! frame is timestamped with the rig clock as soon as it completes, before
//! any parsing.
//!
//! Frames that completed before a wait began are stale: the box they
//! describe has moved on.  [`Vision::discard_stale`] drops them with a
//! warning so `t_ref` always belongs to a detection that arrived during the
//! wait.

use std::io::{BufRead, BufReader, ErrorKind};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use pickrig_types::{Clock, Detection, Observation, RigError};
use tracing::{debug, info, warn};

use crate::vision::Vision;

/// Default port of the vision system's result server.
pub const VISION_PORT: u16 = 2024;

/// Parse one `dx|dy|theta` frame.
///
/// # Errors
///
/// Returns [`RigError::CollaboratorFault`] for non-UTF-8 input, a field
/// count other than three, or a field that is not a number.
pub fn parse_detection(frame: &[u8]) -> Result<Detection, RigError> {
    let text = std::str::from_utf8(frame).map_err(|e| RigError::fault("vision", e))?;
    let fields = text
        .trim()
        .split('|')
        .map(|f| f.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| RigError::fault("vision", format!("malformed frame {text:?}: {e}")))?;
    match fields.as_slice() {
        [dx, dy, theta] => Ok(Detection {
            dx: *dx,
            dy: *dy,
            theta: *theta,
        }),
        _ => Err(RigError::fault(
            "vision",
            format!("expected 3 fields, got {} in {text:?}", fields.len()),
        )),
    }
}

/// Connection to the vision system.
pub struct VisionLink {
    id: String,
    reader: BufReader<TcpStream>,
    /// Bytes of a frame whose terminator has not arrived yet.  Kept across
    /// timed-out waits.
    partial: Vec<u8>,
    clock: Arc<dyn Clock>,
}

impl VisionLink {
    /// Connect to the vision system at `addr`, stamping detections with
    /// `clock`.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::CollaboratorFault`] when the connection fails.
    pub fn connect(addr: impl ToSocketAddrs, clock: Arc<dyn Clock>) -> Result<Self, RigError> {
        let stream = TcpStream::connect(addr).map_err(|e| RigError::fault("vision", e))?;
        if let Ok(peer) = stream.peer_addr() {
            info!(%peer, "connected to vision system");
        }
        Ok(Self {
            id: "vision".to_string(),
            reader: BufReader::new(stream),
            partial: Vec::new(),
            clock,
        })
    }

    fn set_nonblocking(&self, nonblocking: bool) -> Result<(), RigError> {
        self.reader
            .get_ref()
            .set_nonblocking(nonblocking)
            .map_err(|e| RigError::fault(&self.id, e))
    }
}

impl Vision for VisionLink {
    fn id(&self) -> &str {
        &self.id
    }

    /// Drops every frame that is already complete without waiting for more
    /// bytes.  A trailing partial frame is kept.
    fn discard_stale(&mut self) -> Result<usize, RigError> {
        self.set_nonblocking(true)?;
        let mut discarded = 0;
        let outcome = loop {
            match self.reader.read_until(b'\n', &mut self.partial) {
                Ok(_) if self.partial.ends_with(b"\n") => {
                    warn!(
                        frame = %String::from_utf8_lossy(&self.partial).trim(),
                        "discarding stale detection"
                    );
                    self.partial.clear();
                    discarded += 1;
                }
                // End of stream or nothing more buffered.
                Ok(_) => break Ok(discarded),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break Ok(discarded),
                Err(e) => break Err(RigError::fault(&self.id, e)),
            }
        };
        self.set_nonblocking(false)?;
        outcome
    }

    fn next_detection(&mut self, timeout: Option<Duration>) -> Result<Observation, RigError> {
        // A zero read timeout is rejected by the socket layer.
        let socket_timeout = timeout.map(|t| t.max(Duration::from_millis(1)));
        self.reader
            .get_ref()
            .set_read_timeout(socket_timeout)
            .map_err(|e| RigError::fault(&self.id, e))?;

        match self.reader.read_until(b'\n', &mut self.partial) {
            Ok(_) => {}
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                if !self.partial.is_empty() {
                    debug!(buffered = self.partial.len(), "partial frame held over");
                }
                return Err(RigError::ObservationTimeout(
                    timeout.unwrap_or_default().as_secs_f64(),
                ));
            }
            Err(e) => return Err(RigError::fault(&self.id, e)),
        }
        let t_ref = self.clock.now();
        // Without a terminator the read stopped at end of stream.
        if self.partial.is_empty() {
            return Err(RigError::fault(&self.id, "connection closed by vision system"));
        }

        let frame = std::mem::take(&mut self.partial);
        let detection = parse_detection(&frame)?;
        debug!(?detection, "detection received");
        Ok(Observation::new(detection, t_ref))
    }
}
