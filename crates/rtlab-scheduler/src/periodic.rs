//! Absolute-deadline periodic activation.
//!
//! A [`PeriodicTimer`] anchors a schedule at a start timestamp and releases
//! its task at `deadline_k = start + k * period` for `k = 1, 2, …`. Deadlines
//! are computed from the anchor every time, never by accumulating the
//! previous wake time, so a long job or a late wake-up cannot shift the
//! schedule.
//!
//! # Overruns
//!
//! When `wait_next_period` is entered after the pending deadline has already
//! passed, the previous job overran. The number of missed release points is
//! `floor((now - deadline) / period) + 1`. What happens next depends on the
//! [`OverrunPolicy`].

use crate::clock::{Clock, MonotonicClock, Timestamp, Wake};
use crate::error::{SchedError, SchedResult};
use rtlab_sync::ShutdownSignal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What to do when a job runs past one or more release points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrunPolicy {
    /// Return [`SchedError::Overrun`]; the task is expected to stop.
    #[default]
    Fatal,
    /// Skip the missed release points and wait for the next future one.
    SkipMissed,
}

/// A successful periodic release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    /// Deadline index `k` (first release is 1).
    pub index: u64,
    /// Scheduled release time.
    pub deadline: Timestamp,
    /// Clock reading after the wait returned.
    pub woke_at: Timestamp,
    /// Release points skipped before this one (always 0 under
    /// [`OverrunPolicy::Fatal`]).
    pub overruns: u64,
}

impl Activation {
    /// Wake-up latency past the deadline, in nanoseconds.
    #[must_use]
    pub fn lateness_ns(&self) -> u64 {
        self.woke_at.saturating_nanos_since(self.deadline)
    }
}

/// Periodic release engine for one task.
///
/// Owned by the task thread; not shared.
///
/// # RT-Safety
///
/// - `wait_next_period` is O(1) and allocation-free
/// - The only suspension point is the clock's `sleep_until`
///
/// # Example
///
/// ```
/// use rtlab_scheduler::{Clock, PeriodicTimer, SimulatedClock};
/// use std::time::Duration;
///
/// let clock = SimulatedClock::new();
/// let mut timer = PeriodicTimer::with_clock(clock.clone(), Duration::from_millis(100))?;
/// timer.start_periodic();
///
/// let first = timer.wait_next_period()?;
/// assert_eq!(first.index, 1);
/// assert_eq!(first.deadline.as_nanos(), 100_000_000);
/// assert_eq!(clock.now(), first.deadline);
/// # Ok::<(), rtlab_scheduler::SchedError>(())
/// ```
#[derive(Debug)]
pub struct PeriodicTimer<C: Clock = MonotonicClock> {
    clock: C,
    period_ns: u64,
    policy: OverrunPolicy,
    shutdown: Option<ShutdownSignal>,
    start: Option<Timestamp>,
    next_index: u64,
    activations: u64,
    overruns_skipped: u64,
}

impl PeriodicTimer<MonotonicClock> {
    /// Create a timer on a fresh [`MonotonicClock`].
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::InvalidPeriod`] for a zero period.
    pub fn new(period: Duration) -> SchedResult<Self> {
        Self::with_clock(MonotonicClock::new(), period)
    }
}

impl<C: Clock> PeriodicTimer<C> {
    /// Create a timer on `clock`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::InvalidPeriod`] if `period` is zero or does not
    /// fit in `u64` nanoseconds.
    pub fn with_clock(clock: C, period: Duration) -> SchedResult<Self> {
        let period_ns = u64::try_from(period.as_nanos())
            .ok()
            .filter(|&ns| ns > 0)
            .ok_or(SchedError::InvalidPeriod)?;
        Ok(Self {
            clock,
            period_ns,
            policy: OverrunPolicy::default(),
            shutdown: None,
            start: None,
            next_index: 1,
            activations: 0,
            overruns_skipped: 0,
        })
    }

    /// Set the overrun policy.
    #[must_use]
    pub fn with_policy(mut self, policy: OverrunPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Make deadline waits return [`SchedError::Shutdown`] when `signal` fires.
    #[must_use]
    pub fn with_shutdown(mut self, signal: &ShutdownSignal) -> Self {
        self.shutdown = Some(signal.clone());
        self
    }

    /// Anchor the schedule at the current clock reading.
    pub fn start_periodic(&mut self) {
        let now = self.clock.now();
        self.start_periodic_at(now);
    }

    /// Anchor the schedule at `start`.
    ///
    /// Restarting resets the deadline index and counters.
    pub fn start_periodic_at(&mut self, start: Timestamp) {
        self.start = Some(start);
        self.next_index = 1;
        self.activations = 0;
        self.overruns_skipped = 0;
    }

    /// Absolute time of deadline `k`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::NotStarted`] before the schedule is anchored and
    /// [`SchedError::DeadlineOverflow`] if the deadline is not representable.
    pub fn deadline(&self, k: u64) -> SchedResult<Timestamp> {
        let start = self.start.ok_or(SchedError::NotStarted)?;
        k.checked_mul(self.period_ns)
            .and_then(|offset| start.checked_add_nanos(offset))
            .ok_or(SchedError::DeadlineOverflow)
    }

    /// The deadline the next `wait_next_period` call will wait for, ignoring
    /// overruns.
    ///
    /// # Errors
    ///
    /// Same as [`PeriodicTimer::deadline`].
    pub fn next_deadline(&self) -> SchedResult<Timestamp> {
        self.deadline(self.next_index)
    }

    /// Block until the next release point.
    ///
    /// # Errors
    ///
    /// - [`SchedError::NotStarted`] if the schedule was never anchored
    /// - [`SchedError::Overrun`] if the pending deadline had already passed
    ///   under [`OverrunPolicy::Fatal`]
    /// - [`SchedError::Shutdown`] if the shutdown signal fired
    /// - [`SchedError::DeadlineOverflow`] / [`SchedError::SleepFailed`] on
    ///   arithmetic or platform failure
    pub fn wait_next_period(&mut self) -> SchedResult<Activation> {
        let mut deadline = self.next_deadline()?;
        if self.shutdown_requested() {
            return Err(SchedError::Shutdown);
        }

        let mut overruns = 0;
        let now = self.clock.now();
        if now > deadline {
            let missed = (now.saturating_nanos_since(deadline) / self.period_ns).saturating_add(1);
            match self.policy {
                OverrunPolicy::Fatal => return Err(SchedError::Overrun { missed }),
                OverrunPolicy::SkipMissed => {
                    self.next_index = self
                        .next_index
                        .checked_add(missed)
                        .ok_or(SchedError::DeadlineOverflow)?;
                    deadline = self.next_deadline()?;
                    overruns = missed;
                    self.overruns_skipped = self.overruns_skipped.saturating_add(missed);
                }
            }
        }

        if self.clock.sleep_until(deadline, self.shutdown.as_ref())? == Wake::Shutdown {
            return Err(SchedError::Shutdown);
        }

        let index = self.next_index;
        self.next_index = index.checked_add(1).ok_or(SchedError::DeadlineOverflow)?;
        self.activations = self.activations.saturating_add(1);

        Ok(Activation {
            index,
            deadline,
            woke_at: self.clock.now(),
            overruns,
        })
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(ShutdownSignal::is_triggered)
    }

    /// Period.
    #[inline]
    #[must_use]
    pub fn period(&self) -> Duration {
        Duration::from_nanos(self.period_ns)
    }

    /// Period in nanoseconds.
    #[inline]
    #[must_use]
    pub fn period_ns(&self) -> u64 {
        self.period_ns
    }

    /// Overrun policy.
    #[inline]
    #[must_use]
    pub fn policy(&self) -> OverrunPolicy {
        self.policy
    }

    /// Schedule anchor, if started.
    #[inline]
    #[must_use]
    pub fn start(&self) -> Option<Timestamp> {
        self.start
    }

    /// Check if the schedule has been anchored.
    #[inline]
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.start.is_some()
    }

    /// Successful releases since the schedule was anchored.
    #[inline]
    #[must_use]
    pub fn activations(&self) -> u64 {
        self.activations
    }

    /// Release points skipped under [`OverrunPolicy::SkipMissed`].
    #[inline]
    #[must_use]
    pub fn overruns_skipped(&self) -> u64 {
        self.overruns_skipped
    }

    /// The clock the timer reads.
    #[inline]
    pub fn clock(&self) -> &C {
        &self.clock
    }
}
