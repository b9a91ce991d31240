//! Producer → consumer links built from a guarded slot and a signalling
//! semaphore.
//!
//! A producer deposits a value and releases the handoff semaphore; the
//! consumer blocks on the semaphore and takes the value. Two modes:
//!
//! - [`HandoffMode::Latest`]: binary semaphore, at most one outstanding unit.
//!   A producer that publishes before the previous unit was consumed replaces
//!   it ([`Publish::Replaced`]); the consumer sees only the newest value.
//! - [`HandoffMode::Queued`]: counting semaphore, every published unit is
//!   received exactly once. Publishing while `capacity` units are pending
//!   fails with [`SyncError::Full`].

use crate::error::{SyncError, SyncResult};
use crate::guarded::Guarded;
use crate::semaphore::Semaphore;
use crate::shutdown::ShutdownSignal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

/// Delivery semantics of a [`Handoff`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum HandoffMode {
    /// Binary handoff; newer units overwrite unconsumed ones.
    #[default]
    Latest,
    /// Counting handoff; units accumulate up to `capacity`.
    Queued {
        /// Maximum number of unconsumed units.
        capacity: u32,
    },
}

/// Outcome of [`Handoff::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
    /// The unit was added for the consumer.
    Delivered,
    /// The unit replaced one the consumer had not taken yet.
    Replaced,
}

/// A single-stage producer → consumer link.
pub struct Handoff<T> {
    mode: HandoffMode,
    slot: Guarded<VecDeque<T>>,
    signal: Semaphore,
}

impl<T> Handoff<T> {
    /// Create a handoff.
    ///
    /// `shutdown` wakes a consumer blocked in [`Handoff::receive`].
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] for a queued handoff with zero
    /// capacity.
    pub fn new(
        name: impl Into<String>,
        mode: HandoffMode,
        shutdown: Option<&ShutdownSignal>,
    ) -> SyncResult<Self> {
        let name = name.into();
        let capacity = match mode {
            HandoffMode::Latest => 1,
            HandoffMode::Queued { capacity: 0 } => {
                return Err(SyncError::InvalidConfig(
                    "queued handoff capacity must be greater than 0",
                ));
            }
            HandoffMode::Queued { capacity } => capacity,
        };

        let mut builder = Semaphore::builder(format!("{name}.signal")).capacity(capacity);
        if let Some(signal) = shutdown {
            builder = builder.shutdown(signal);
        }

        Ok(Self {
            mode,
            slot: Guarded::new(format!("{name}.slot"), VecDeque::new()),
            signal: builder.build()?,
        })
    }

    /// Binary handoff keeping only the newest unit.
    #[must_use]
    pub fn latest(name: impl Into<String>, shutdown: Option<&ShutdownSignal>) -> Self {
        let name = name.into();
        Self {
            mode: HandoffMode::Latest,
            slot: Guarded::new(format!("{name}.slot"), VecDeque::with_capacity(1)),
            signal: Semaphore::with_parts(format!("{name}.signal"), 0, 1, shutdown.cloned()),
        }
    }

    /// Counting handoff keeping up to `capacity` units.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] if `capacity` is zero.
    pub fn queued(
        name: impl Into<String>,
        capacity: u32,
        shutdown: Option<&ShutdownSignal>,
    ) -> SyncResult<Self> {
        Self::new(name, HandoffMode::Queued { capacity }, shutdown)
    }

    /// Deposit a unit and signal the consumer.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Full`] when a queued handoff is at capacity. The
    /// unit is dropped in that case.
    pub fn publish(&self, value: T) -> SyncResult<Publish> {
        let outcome = {
            let mut slot = self.slot.lock()?;
            match self.mode {
                HandoffMode::Latest => {
                    let replaced = slot.pop_front().is_some();
                    slot.push_back(value);
                    if replaced {
                        Publish::Replaced
                    } else {
                        Publish::Delivered
                    }
                }
                HandoffMode::Queued { capacity } => {
                    if slot.len() >= usize::try_from(capacity).unwrap_or(usize::MAX) {
                        return Err(SyncError::Full { capacity });
                    }
                    slot.push_back(value);
                    Publish::Delivered
                }
            }
        };

        self.signal.release();
        Ok(outcome)
    }

    /// Block until a unit is available and take it.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Shutdown`] if shutdown fires while blocked.
    pub fn receive(&self) -> SyncResult<T> {
        loop {
            self.signal.acquire()?;
            if let Some(value) = self.take()? {
                return Ok(value);
            }
        }
    }

    /// Like [`Handoff::receive`] with a bounded wait.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Timeout`] if nothing arrived in time.
    pub fn receive_timeout(&self, timeout: Duration) -> SyncResult<T> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.receive();
        };
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            self.signal.acquire_timeout(remaining)?;
            if let Some(value) = self.take()? {
                return Ok(value);
            }
        }
    }

    /// Take a unit if one is signalled, without blocking.
    pub fn try_receive(&self) -> Option<T> {
        if !self.signal.try_acquire() {
            return None;
        }
        self.take().ok().flatten()
    }

    fn take(&self) -> SyncResult<Option<T>> {
        Ok(self.slot.lock()?.pop_front())
    }

    /// Number of unconsumed units.
    pub fn pending(&self) -> usize {
        self.slot.lock().map(|slot| slot.len()).unwrap_or(0)
    }

    /// Delivery mode.
    pub fn mode(&self) -> HandoffMode {
        self.mode
    }

    /// The signalling semaphore the consumer blocks on.
    pub fn signal(&self) -> &Semaphore {
        &self.signal
    }
}

impl<T> fmt::Debug for Handoff<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handoff")
            .field("mode", &self.mode)
            .field("signal", &self.signal)
            .finish_non_exhaustive()
    }
}
