//! Monotonic time sources.
//!
//! The rig never reads `Instant::now()` directly.  Drivers stamp observations
//! and the synchronizer gates deadlines through a [`Clock`], so tests can
//! substitute a [`SimClock`] whose time only moves when it is read or
//! explicitly advanced.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A monotonic time source.
pub trait Clock: Send + Sync {
    /// Current instant.  Successive calls never go backwards.
    fn now(&self) -> Instant;

    /// Time elapsed since `origin`, saturating at zero.
    fn elapsed_since(&self, origin: Instant) -> Duration {
        self.now().saturating_duration_since(origin)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// The host's monotonic clock (`std::time::Instant`).
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Deterministic clock for tests and simulation.
///
/// Time starts at a fixed origin and advances by `step` on every
/// [`Clock::now`] call, which lets spin-waits make progress without real
/// time passing.  [`SimClock::advance`] jumps forward explicitly.
#[derive(Debug)]
pub struct SimClock {
    origin: Instant,
    elapsed_nanos: AtomicU64,
    step_nanos: u64,
}

impl SimClock {
    /// A clock that advances by `step` per read.
    pub fn new(step: Duration) -> Self {
        Self {
            origin: Instant::now(),
            elapsed_nanos: AtomicU64::new(0),
            step_nanos: step.as_nanos() as u64,
        }
    }

    /// A clock that only moves through [`SimClock::advance`].
    pub fn frozen() -> Self {
        Self::new(Duration::ZERO)
    }

    /// The instant this clock reports as zero elapsed time.
    pub fn origin(&self) -> Instant {
        self.origin
    }

    /// Jump forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.elapsed_nanos
            .fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Time elapsed since [`SimClock::origin`] without advancing the clock.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::SeqCst))
    }
}

impl Clock for SimClock {
    fn now(&self) -> Instant {
        let nanos = self
            .elapsed_nanos
            .fetch_add(self.step_nanos, Ordering::SeqCst);
        self.origin + Duration::from_nanos(nanos)
    }
}
