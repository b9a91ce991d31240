//! Monotonic clock sources.
//!
//! Timing is expressed as [`Timestamp`]s: nanoseconds since the clock's own
//! epoch. [`MonotonicClock`] is backed by [`std::time::Instant`] and the
//! platform high-precision sleep; [`SimulatedClock`] only moves when told to
//! and is used to test schedules without waiting in real time.

use crate::error::{SchedError, SchedResult};
use rtlab_sync::ShutdownSignal;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[cfg(target_os = "linux")]
use crate::linux as platform;

#[cfg(not(target_os = "linux"))]
use crate::fallback as platform;

/// Remaining time below which the shutdown-aware wait stops blocking and
/// busy-spins to the deadline.
const SPIN_TAIL: Duration = Duration::from_micros(80);

/// A point in time, in nanoseconds since the clock epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The clock epoch.
    pub const ZERO: Timestamp = Timestamp(0);

    /// Create a timestamp from nanoseconds since the epoch.
    #[inline]
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Nanoseconds since the epoch.
    #[inline]
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Add `nanos`, returning `None` on overflow.
    #[inline]
    #[must_use]
    pub fn checked_add_nanos(self, nanos: u64) -> Option<Self> {
        self.0.checked_add(nanos).map(Self)
    }

    /// Nanoseconds elapsed since `earlier`, or zero if `earlier` is later.
    #[inline]
    #[must_use]
    pub fn saturating_nanos_since(self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Duration elapsed since `earlier`, or zero if `earlier` is later.
    #[inline]
    #[must_use]
    pub fn saturating_duration_since(self, earlier: Timestamp) -> Duration {
        Duration::from_nanos(self.saturating_nanos_since(earlier))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

/// Why a [`Clock::sleep_until`] call returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The deadline was reached.
    Deadline,
    /// The shutdown signal fired first.
    Shutdown,
}

/// A monotonic time source that can block until a deadline.
pub trait Clock: Send + Sync {
    /// Current reading.
    fn now(&self) -> Timestamp;

    /// Block until `deadline`, or until `shutdown` fires.
    ///
    /// Returns immediately with [`Wake::Deadline`] if the deadline has
    /// passed and with [`Wake::Shutdown`] if the signal is already set.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::SleepFailed`] if the platform sleep fails.
    fn sleep_until(
        &self,
        deadline: Timestamp,
        shutdown: Option<&ShutdownSignal>,
    ) -> SchedResult<Wake>;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }

    fn sleep_until(
        &self,
        deadline: Timestamp,
        shutdown: Option<&ShutdownSignal>,
    ) -> SchedResult<Wake> {
        (**self).sleep_until(deadline, shutdown)
    }
}

/// Wall-clock-independent monotonic clock backed by [`Instant`].
///
/// # RT-Safety
///
/// - `now` is a single `Instant::now()` call
/// - Without a shutdown signal, `sleep_until` uses `clock_nanosleep` on Linux
///   for the bulk of the wait, then busy-spins the final ~80µs
/// - With a shutdown signal, the bulk of the wait blocks on the signal's
///   condition variable so that shutdown wakes the task immediately
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    /// Create a clock whose epoch is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// The `Instant` corresponding to `ts`, if representable.
    fn instant_at(&self, ts: Timestamp) -> Option<Instant> {
        self.epoch.checked_add(Duration::from_nanos(ts.as_nanos()))
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        let nanos = self.epoch.elapsed().as_nanos();
        Timestamp(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    fn sleep_until(
        &self,
        deadline: Timestamp,
        shutdown: Option<&ShutdownSignal>,
    ) -> SchedResult<Wake> {
        if shutdown.is_some_and(ShutdownSignal::is_triggered) {
            return Ok(Wake::Shutdown);
        }
        let target = self
            .instant_at(deadline)
            .ok_or(SchedError::DeadlineOverflow)?;

        let Some(signal) = shutdown else {
            platform::sleep_until(target)?;
            return Ok(Wake::Deadline);
        };

        let remaining = target.saturating_duration_since(Instant::now());
        if remaining > SPIN_TAIL && signal.wait_timeout(remaining.saturating_sub(SPIN_TAIL)) {
            return Ok(Wake::Shutdown);
        }

        while Instant::now() < target {
            std::hint::spin_loop();
        }
        Ok(Wake::Deadline)
    }
}

/// Manually driven clock for deterministic tests.
///
/// `sleep_until` never blocks: it advances the clock to the deadline (time
/// never goes backwards) and returns. Clones share the same time.
///
/// ```
/// use rtlab_scheduler::{Clock, SimulatedClock, Timestamp, Wake};
/// use std::time::Duration;
///
/// let clock = SimulatedClock::new();
/// clock.advance(Duration::from_millis(5));
/// assert_eq!(clock.now(), Timestamp::from_nanos(5_000_000));
///
/// let wake = clock.sleep_until(Timestamp::from_nanos(8_000_000), None)?;
/// assert_eq!(wake, Wake::Deadline);
/// assert_eq!(clock.now().as_nanos(), 8_000_000);
/// # Ok::<(), rtlab_scheduler::SchedError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct SimulatedClock {
    now_ns: Arc<AtomicU64>,
}

impl SimulatedClock {
    /// Create a clock reading [`Timestamp::ZERO`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock reading `start`.
    #[must_use]
    pub fn starting_at(start: Timestamp) -> Self {
        Self {
            now_ns: Arc::new(AtomicU64::new(start.as_nanos())),
        }
    }

    /// Move time forward by `by`, saturating at the end of the range.
    pub fn advance(&self, by: Duration) {
        let by = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        let mut current = self.now_ns.load(Ordering::Acquire);
        loop {
            let next = current.saturating_add(by);
            match self.now_ns.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Move time forward to `ts`; earlier values are ignored.
    pub fn advance_to(&self, ts: Timestamp) {
        self.now_ns.fetch_max(ts.as_nanos(), Ordering::AcqRel);
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.now_ns.load(Ordering::Acquire))
    }

    fn sleep_until(
        &self,
        deadline: Timestamp,
        shutdown: Option<&ShutdownSignal>,
    ) -> SchedResult<Wake> {
        if shutdown.is_some_and(ShutdownSignal::is_triggered) {
            return Ok(Wake::Shutdown);
        }
        self.advance_to(deadline);
        Ok(Wake::Deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_arithmetic() {
        let ts = Timestamp::from_nanos(100);
        assert_eq!(ts.checked_add_nanos(50), Some(Timestamp::from_nanos(150)));
        assert_eq!(Timestamp::from_nanos(u64::MAX).checked_add_nanos(1), None);
        assert_eq!(ts.saturating_nanos_since(Timestamp::from_nanos(40)), 60);
        assert_eq!(Timestamp::from_nanos(40).saturating_nanos_since(ts), 0);
    }

    #[test]
    fn test_monotonic_clock_advances() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        std::thread::sleep(Duration::from_millis(1));
        let b = clock.now();
        assert!(b > a);
    }

    #[test]
    fn test_monotonic_sleep_reaches_deadline() -> SchedResult {
        let clock = MonotonicClock::new();
        let deadline = clock
            .now()
            .checked_add_nanos(2_000_000)
            .ok_or(SchedError::DeadlineOverflow)?;

        assert_eq!(clock.sleep_until(deadline, None)?, Wake::Deadline);
        assert!(clock.now() >= deadline);
        Ok(())
    }

    #[test]
    fn test_monotonic_sleep_woken_by_shutdown() -> SchedResult {
        let clock = MonotonicClock::new();
        let signal = ShutdownSignal::new();
        let trigger = signal.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            trigger.trigger();
        });

        let start = Instant::now();
        let far = Timestamp::from_nanos(60_000_000_000);
        assert_eq!(clock.sleep_until(far, Some(&signal))?, Wake::Shutdown);
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(handle.join().is_ok());
        Ok(())
    }

    #[test]
    fn test_past_deadline_returns_immediately() -> SchedResult {
        let clock = MonotonicClock::new();
        std::thread::sleep(Duration::from_millis(1));
        assert_eq!(clock.sleep_until(Timestamp::ZERO, None)?, Wake::Deadline);
        Ok(())
    }

    #[test]
    fn test_simulated_clock_never_goes_backwards() -> SchedResult {
        let clock = SimulatedClock::starting_at(Timestamp::from_nanos(1_000));
        clock.sleep_until(Timestamp::from_nanos(500), None)?;
        assert_eq!(clock.now().as_nanos(), 1_000);

        clock.advance_to(Timestamp::from_nanos(2_000));
        clock.advance(Duration::from_nanos(5));
        assert_eq!(clock.now().as_nanos(), 2_005);
        Ok(())
    }

    #[test]
    fn test_simulated_clock_honours_shutdown() -> SchedResult {
        let clock = SimulatedClock::new();
        let signal = ShutdownSignal::new();
        signal.trigger();
        assert_eq!(
            clock.sleep_until(Timestamp::from_nanos(10), Some(&signal))?,
            Wake::Shutdown
        );
        assert_eq!(clock.now(), Timestamp::ZERO);
        Ok(())
    }
}
