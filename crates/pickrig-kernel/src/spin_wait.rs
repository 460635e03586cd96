//! Busy-polling deadline wait.
//!
//! Deadlines in a pick cycle are a few hundred milliseconds out and must be
//! hit to within a millisecond or so, so the wait never yields to the OS
//! scheduler.  It re-reads the clock in a tight loop, measuring from `t_ref`
//! rather than from when the wait started, and checks the cancel flag on
//! every iteration.

use std::time::{Duration, Instant};

use pickrig_types::Clock;

use crate::cancel::CancelToken;

/// How a [`spin_until`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// The deadline passed; carries the elapsed time since `t_ref` at
    /// release.
    Released(Duration),
    /// Cancellation was requested before the deadline passed.
    Cancelled,
}

/// Spin until `offset` has elapsed since `t_ref` on `clock`.
///
/// Returns immediately with [`Wait::Released`] when the deadline is already
/// behind us.  Cancellation is checked before the clock on every iteration,
/// so a cancelled token never releases a deadline.
pub fn spin_until(clock: &dyn Clock, t_ref: Instant, offset: Duration, cancel: &CancelToken) -> Wait {
    loop {
        if cancel.is_cancelled() {
            return Wait::Cancelled;
        }
        let elapsed = clock.elapsed_since(t_ref);
        if elapsed >= offset {
            return Wait::Released(elapsed);
        }
        std::hint::spin_loop();
    }
}
