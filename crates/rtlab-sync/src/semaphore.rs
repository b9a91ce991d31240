//! Counting and binary semaphores with FIFO wake order.
//!
//! # Invariants
//!
//! - **FIFO**: blocked waiters are granted units in arrival order
//! - **Direct handoff**: `release` gives the unit straight to the queue head,
//!   so `count > 0` implies the wait queue is empty
//! - **Bounded**: `count` never exceeds the configured capacity; a release on
//!   a full semaphore reports [`Release::Saturated`] and changes nothing
//! - **Cancellable**: a semaphore built with a [`ShutdownSignal`] wakes its
//!   blocked waiters with [`SyncError::Shutdown`] when the signal fires. A unit
//!   that is already available is still handed out after shutdown so holders
//!   can finish releasing.
//!
//! # Usage
//!
//! ```
//! use rtlab_sync::{Release, Semaphore};
//!
//! // Producer/consumer handoff: starts empty.
//! let ready = Semaphore::binary("ready", false);
//! assert!(!ready.try_acquire());
//!
//! assert_eq!(ready.release(), Release::Incremented);
//! assert_eq!(ready.release(), Release::Saturated);
//! assert!(ready.try_acquire());
//! ```
//!
//! # Design Notes
//!
//! Uses `Mutex` + `Condvar` with per-waiter tickets. Waiters block on a
//! shared condition variable and leave only once their own ticket has been
//! granted, which gives strict FIFO order without one condvar per waiter.

use crate::error::{SyncError, SyncResult};
use crate::shutdown::ShutdownSignal;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of [`Semaphore::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// The unit went directly to the oldest blocked waiter.
    HandedOff,
    /// No waiter was blocked; the count was incremented.
    Incremented,
    /// The count was already at capacity; nothing changed.
    Saturated,
}

#[derive(Debug)]
struct State {
    count: u32,
    queue: VecDeque<u64>,
    granted: Vec<u64>,
    next_ticket: u64,
}

impl State {
    fn take_grant(&mut self, ticket: u64) -> bool {
        match self.granted.iter().position(|&t| t == ticket) {
            Some(pos) => {
                self.granted.swap_remove(pos);
                true
            }
            None => false,
        }
    }

    fn withdraw(&mut self, ticket: u64) {
        self.queue.retain(|&t| t != ticket);
    }
}

struct Inner {
    name: String,
    capacity: u32,
    state: Mutex<State>,
    cv: Condvar,
    shutdown: Option<ShutdownSignal>,
}

impl Inner {
    fn wake_all(&self) {
        let _state = self.state.lock();
        self.cv.notify_all();
    }
}

/// Shared semaphore handle.
///
/// Cloning yields another handle to the same semaphore; all clones share one
/// count and one wait queue. Lifetime is that of the last handle.
#[derive(Clone)]
pub struct Semaphore {
    inner: Arc<Inner>,
}

impl Semaphore {
    /// Create a binary semaphore.
    ///
    /// `available = true` builds a mutual-exclusion lock, `false` a
    /// producer/consumer handoff that starts empty.
    #[must_use]
    pub fn binary(name: impl Into<String>, available: bool) -> Self {
        Self::with_parts(name.into(), u32::from(available), 1, None)
    }

    /// Create a counting semaphore.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] if `capacity` is zero or
    /// `initial > capacity`.
    pub fn counting(name: impl Into<String>, initial: u32, capacity: u32) -> SyncResult<Self> {
        SemaphoreBuilder::new(name)
            .initial(initial)
            .capacity(capacity)
            .build()
    }

    /// Start building a semaphore.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> SemaphoreBuilder {
        SemaphoreBuilder::new(name)
    }

    pub(crate) fn with_parts(
        name: String,
        initial: u32,
        capacity: u32,
        shutdown: Option<ShutdownSignal>,
    ) -> Self {
        let inner = Arc::new(Inner {
            name,
            capacity,
            state: Mutex::new(State {
                count: initial,
                queue: VecDeque::new(),
                granted: Vec::new(),
                next_ticket: 0,
            }),
            cv: Condvar::new(),
            shutdown,
        });

        if let Some(signal) = &inner.shutdown {
            let weak = Arc::downgrade(&inner);
            signal.on_trigger(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.wake_all();
                }
            });
        }

        Self { inner }
    }

    /// Acquire one unit, blocking until one is available.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Shutdown`] if the attached shutdown signal fires
    /// while the caller is blocked.
    pub fn acquire(&self) -> SyncResult<()> {
        self.wait(None)
    }

    /// Acquire one unit, blocking for at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Timeout`] if no unit became available in time and
    /// [`SyncError::Shutdown`] if shutdown was requested while blocked.
    pub fn acquire_timeout(&self, timeout: Duration) -> SyncResult<()> {
        self.wait(Instant::now().checked_add(timeout))
    }

    /// Acquire one unit without blocking.
    ///
    /// Returns `true` if a unit was taken.
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        let mut state = self.inner.state.lock();
        if state.count > 0 {
            state.count -= 1;
            return true;
        }
        false
    }

    /// Acquire one unit and return a permit that releases it on drop.
    ///
    /// # Errors
    ///
    /// Same as [`Semaphore::acquire`].
    pub fn acquire_guard(&self) -> SyncResult<Permit<'_>> {
        self.acquire()?;
        Ok(Permit { semaphore: self })
    }

    /// Like [`Semaphore::acquire_guard`] with a bounded wait.
    ///
    /// # Errors
    ///
    /// Same as [`Semaphore::acquire_timeout`].
    pub fn acquire_guard_timeout(&self, timeout: Duration) -> SyncResult<Permit<'_>> {
        self.acquire_timeout(timeout)?;
        Ok(Permit { semaphore: self })
    }

    /// Release one unit.
    ///
    /// The unit goes to the oldest blocked waiter if there is one, otherwise
    /// the count is incremented up to capacity.
    pub fn release(&self) -> Release {
        let mut state = self.inner.state.lock();
        if let Some(ticket) = state.queue.pop_front() {
            state.granted.push(ticket);
            drop(state);
            self.inner.cv.notify_all();
            return Release::HandedOff;
        }

        if state.count < self.inner.capacity {
            state.count += 1;
            Release::Incremented
        } else {
            tracing::trace!(semaphore = %self.inner.name, "release on saturated semaphore");
            Release::Saturated
        }
    }

    fn wait(&self, deadline: Option<Instant>) -> SyncResult<()> {
        let mut state = self.inner.state.lock();
        if state.count > 0 {
            state.count -= 1;
            return Ok(());
        }
        if self.shutdown_requested() {
            return Err(SyncError::Shutdown);
        }

        let ticket = state.next_ticket;
        state.next_ticket = state.next_ticket.wrapping_add(1);
        state.queue.push_back(ticket);

        loop {
            if state.take_grant(ticket) {
                return Ok(());
            }
            if self.shutdown_requested() {
                state.withdraw(ticket);
                return Err(SyncError::Shutdown);
            }

            match deadline {
                None => self.inner.cv.wait(&mut state),
                Some(deadline) => {
                    if self.inner.cv.wait_until(&mut state, deadline).timed_out() {
                        if state.take_grant(ticket) {
                            return Ok(());
                        }
                        state.withdraw(ticket);
                        return Err(SyncError::Timeout);
                    }
                }
            }
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.inner
            .shutdown
            .as_ref()
            .is_some_and(ShutdownSignal::is_triggered)
    }

    /// Semaphore name, used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Units currently available.
    ///
    /// This is a snapshot and may be stale by the time it is used.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.inner.state.lock().count
    }

    /// Number of threads currently queued in a blocking acquire.
    #[must_use]
    pub fn waiters(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Maximum count.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.inner.capacity
    }

    /// Check if this is a binary semaphore.
    #[must_use]
    pub fn is_binary(&self) -> bool {
        self.inner.capacity == 1
    }

    /// Check if two handles refer to the same semaphore.
    #[must_use]
    pub fn same_as(&self, other: &Semaphore) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Semaphore")
            .field("name", &self.inner.name)
            .field("count", &state.count)
            .field("capacity", &self.inner.capacity)
            .field("waiters", &state.queue.len())
            .finish()
    }
}

/// RAII permit returned by [`Semaphore::acquire_guard`].
///
/// Releases its unit when dropped, including on early return and unwinding,
/// so a task leaving its loop never keeps a partner blocked.
#[derive(Debug)]
#[must_use = "dropping the permit releases the semaphore immediately"]
pub struct Permit<'a> {
    semaphore: &'a Semaphore,
}

impl<'a> Permit<'a> {
    /// Wrap a unit the caller has already taken.
    pub(crate) fn adopt(semaphore: &'a Semaphore) -> Self {
        Self { semaphore }
    }

    /// The semaphore this permit was taken from.
    pub fn semaphore(&self) -> &Semaphore {
        self.semaphore
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.semaphore.release();
    }
}

/// Builder for [`Semaphore`].
#[derive(Debug)]
pub struct SemaphoreBuilder {
    name: String,
    initial: u32,
    capacity: u32,
    shutdown: Option<ShutdownSignal>,
}

impl SemaphoreBuilder {
    /// Start a builder for a binary semaphore that is initially empty.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initial: 0,
            capacity: 1,
            shutdown: None,
        }
    }

    /// Set the initial count.
    #[must_use]
    pub fn initial(mut self, initial: u32) -> Self {
        self.initial = initial;
        self
    }

    /// Set the maximum count (1 for a binary semaphore).
    #[must_use]
    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    /// Wake blocked waiters with [`SyncError::Shutdown`] when `signal` fires.
    #[must_use]
    pub fn shutdown(mut self, signal: &ShutdownSignal) -> Self {
        self.shutdown = Some(signal.clone());
        self
    }

    /// Build the semaphore.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] if `capacity` is zero or
    /// `initial > capacity`.
    pub fn build(self) -> SyncResult<Semaphore> {
        if self.capacity == 0 {
            return Err(SyncError::InvalidConfig(
                "semaphore capacity must be greater than 0",
            ));
        }
        if self.initial > self.capacity {
            return Err(SyncError::InvalidConfig(
                "semaphore initial count exceeds capacity",
            ));
        }
        Ok(Semaphore::with_parts(
            self.name,
            self.initial,
            self.capacity,
            self.shutdown,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_initial_state() {
        let lock = Semaphore::binary("lock", true);
        assert_eq!(lock.count(), 1);
        assert!(lock.is_binary());

        let handoff = Semaphore::binary("handoff", false);
        assert_eq!(handoff.count(), 0);
    }

    #[test]
    fn test_builder_rejects_bad_config() {
        assert_eq!(
            Semaphore::builder("s").capacity(0).build().err(),
            Some(SyncError::InvalidConfig(
                "semaphore capacity must be greater than 0"
            ))
        );
        assert!(Semaphore::counting("s", 5, 4).is_err());
        assert!(Semaphore::counting("s", 4, 4).is_ok());
    }

    #[test]
    fn test_release_saturates_at_capacity() -> SyncResult {
        let sem = Semaphore::counting("slots", 0, 2)?;
        assert_eq!(sem.release(), Release::Incremented);
        assert_eq!(sem.release(), Release::Incremented);
        assert_eq!(sem.release(), Release::Saturated);
        assert_eq!(sem.count(), 2);
        Ok(())
    }

    #[test]
    fn test_try_acquire() {
        let sem = Semaphore::binary("s", true);
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());
        sem.release();
        assert!(sem.try_acquire());
    }

    #[test]
    fn test_acquire_timeout_on_empty() {
        let sem = Semaphore::binary("s", false);
        let start = Instant::now();
        assert_eq!(
            sem.acquire_timeout(Duration::from_millis(10)),
            Err(SyncError::Timeout)
        );
        assert!(start.elapsed() >= Duration::from_millis(10));
        assert_eq!(sem.waiters(), 0, "timed-out waiter must leave the queue");
    }

    #[test]
    fn test_permit_releases_on_drop() -> SyncResult {
        let sem = Semaphore::binary("s", true);
        {
            let permit = sem.acquire_guard()?;
            assert_eq!(permit.semaphore().count(), 0);
        }
        assert_eq!(sem.count(), 1);
        Ok(())
    }

    #[test]
    fn test_available_unit_taken_after_shutdown() -> SyncResult {
        let signal = ShutdownSignal::new();
        let sem = Semaphore::builder("s")
            .initial(1)
            .shutdown(&signal)
            .build()?;
        signal.trigger();

        assert_eq!(sem.acquire(), Ok(()));
        assert_eq!(sem.acquire(), Err(SyncError::Shutdown));
        Ok(())
    }

    #[test]
    fn test_clones_share_count() {
        let a = Semaphore::binary("s", false);
        let b = a.clone();
        a.release();
        assert!(b.try_acquire());
        assert!(a.same_as(&b));
    }
}
