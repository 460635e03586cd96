//! [`UrConveyor`] – conveyor controller that dials in to a hosted server.
//!
//! The conveyor kit acts as a TCP client: the rig listens, accepts exactly
//! one connection, activates the TCP command mode and powers the servo.
//! Commands are comma-separated ASCII lines (`<verb>,conv,<arg>`).

use std::io::Write;
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use pickrig_types::RigError;
use tracing::info;

use crate::conveyor::{Conveyor, check_conveyor_speed};

/// Default port the rig hosts for the conveyor controller.
pub const CONVEYOR_PORT: u16 = 2002;

/// A conveyor controller connected to the rig's server socket.
pub struct UrConveyor {
    id: String,
    conn: TcpStream,
}

impl UrConveyor {
    /// Bind `bind`, wait for the controller to connect and bring it up.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::CollaboratorFault`] when binding, accepting or
    /// activation fails.
    pub fn host(bind: impl ToSocketAddrs, settle: Duration) -> Result<Self, RigError> {
        let listener = TcpListener::bind(bind).map_err(|e| RigError::fault("conveyor", e))?;
        if let Ok(local) = listener.local_addr() {
            info!(%local, "hosted conveyor server");
        }
        Self::accept(&listener, settle)
    }

    /// Accept the controller on an already-bound `listener` and bring it up.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::CollaboratorFault`] when accepting or activation
    /// fails.
    pub fn accept(listener: &TcpListener, settle: Duration) -> Result<Self, RigError> {
        let (conn, peer) = listener
            .accept()
            .map_err(|e| RigError::fault("conveyor", e))?;
        info!(%peer, "conveyor controller connected");
        conn.set_nodelay(true)
            .map_err(|e| RigError::fault("conveyor", e))?;

        let mut conveyor = Self {
            id: "conveyor".to_string(),
            conn,
        };
        conveyor.send("activate,tcp\n")?;
        info!("activated conveyor");
        conveyor.set_servo(true)?;
        std::thread::sleep(settle);
        Ok(conveyor)
    }

    fn send(&mut self, line: &str) -> Result<(), RigError> {
        self.conn
            .write_all(line.as_bytes())
            .map_err(|e| RigError::fault(&self.id, e))
    }

    /// Switch servo power on or off.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::CollaboratorFault`] when the command cannot be
    /// sent.
    pub fn set_servo(&mut self, on: bool) -> Result<(), RigError> {
        let state = if on { "on" } else { "off" };
        self.send(&format!("pwr_{state},conv,0\n"))?;
        info!(state, "conveyor servo power");
        Ok(())
    }
}

impl Conveyor for UrConveyor {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_velocity(&mut self, mm_per_s: f64) -> Result<(), RigError> {
        check_conveyor_speed(mm_per_s)?;
        self.send(&format!("set_vel,conv,{mm_per_s}\n"))?;
        info!(mm_per_s, "set conveyor velocity");
        Ok(())
    }

    fn run(&mut self, forward: bool) -> Result<(), RigError> {
        let verb = if forward { "jog_fwd" } else { "jog_bwd" };
        self.send(&format!("{verb},conv,0\n"))?;
        info!(forward, "conveyor jog");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RigError> {
        self.send("jog_stop,conv,0\n")?;
        info!("stopped conveyor");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::thread;

    #[test]
    fn bring_up_and_jog_commands() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let controller = thread::spawn(move || {
            let conn = TcpStream::connect(addr).unwrap();
            BufReader::new(conn)
                .lines()
                .collect::<Result<Vec<_>, _>>()
                .unwrap()
        });

        let mut conveyor = UrConveyor::accept(&listener, Duration::ZERO).unwrap();
        conveyor.set_velocity(20.0).unwrap();
        conveyor.run(true).unwrap();
        conveyor.run(false).unwrap();
        conveyor.stop().unwrap();
        conveyor.set_servo(false).unwrap();
        drop(conveyor);

        assert_eq!(
            controller.join().unwrap(),
            vec![
                "activate,tcp",
                "pwr_on,conv,0",
                "set_vel,conv,20",
                "jog_fwd,conv,0",
                "jog_bwd,conv,0",
                "jog_stop,conv,0",
                "pwr_off,conv,0",
            ]
        );
    }

    #[test]
    fn out_of_range_velocity_is_never_sent() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let controller = thread::spawn(move || {
            let conn = TcpStream::connect(addr).unwrap();
            BufReader::new(conn)
                .lines()
                .collect::<Result<Vec<_>, _>>()
                .unwrap()
        });

        let mut conveyor = UrConveyor::accept(&listener, Duration::ZERO).unwrap();
        let err = conveyor.set_velocity(500.0).unwrap_err();
        assert!(matches!(err, RigError::InvalidConfig(_)));
        drop(conveyor);

        assert_eq!(controller.join().unwrap(), vec!["activate,tcp", "pwr_on,conv,0"]);
    }
}
