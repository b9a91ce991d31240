//! Cooperative, process-wide shutdown signal.
//!
//! The signal is a one-shot latch. Once triggered it stays triggered, wakes
//! every thread blocked in [`ShutdownSignal::wait_timeout`], and runs the
//! registered wake hooks so that semaphores built with the signal release
//! their blocked waiters.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

type WakeHook = Box<dyn Fn() + Send + Sync>;

struct Inner {
    triggered: AtomicBool,
    lock: Mutex<()>,
    cv: Condvar,
    hooks: Mutex<Vec<WakeHook>>,
}

/// Shared shutdown latch.
///
/// Cloning yields another handle to the same latch.
///
/// # Example
///
/// ```
/// use rtlab_sync::ShutdownSignal;
/// use std::time::Duration;
///
/// let shutdown = ShutdownSignal::new();
/// assert!(!shutdown.wait_timeout(Duration::from_millis(1)));
///
/// shutdown.trigger();
/// assert!(shutdown.is_triggered());
/// assert!(shutdown.wait_timeout(Duration::from_secs(60)));
/// ```
#[derive(Clone)]
pub struct ShutdownSignal {
    inner: Arc<Inner>,
}

impl ShutdownSignal {
    /// Create a new, untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                triggered: AtomicBool::new(false),
                lock: Mutex::new(()),
                cv: Condvar::new(),
                hooks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Trigger shutdown.
    ///
    /// Returns `true` if this call flipped the latch, `false` if it was
    /// already triggered. Safe to call from a signal-handler thread.
    pub fn trigger(&self) -> bool {
        if self.inner.triggered.swap(true, Ordering::AcqRel) {
            return false;
        }

        {
            let _guard = self.inner.lock.lock();
            self.inner.cv.notify_all();
        }

        let hooks = self.inner.hooks.lock();
        for hook in hooks.iter() {
            hook();
        }
        true
    }

    /// Check whether shutdown has been requested.
    #[inline]
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::Acquire)
    }

    /// Block for at most `timeout`, returning early if shutdown is triggered.
    ///
    /// Returns `true` if shutdown was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return true;
        };

        let mut guard = self.inner.lock.lock();
        while !self.is_triggered() {
            if self.inner.cv.wait_until(&mut guard, deadline).timed_out() {
                break;
            }
        }
        self.is_triggered()
    }

    /// Block until shutdown is triggered.
    pub fn wait(&self) {
        let mut guard = self.inner.lock.lock();
        while !self.is_triggered() {
            self.inner.cv.wait(&mut guard);
        }
    }

    /// Register a hook that runs once when the signal is triggered.
    ///
    /// If the signal has already fired, the hook runs immediately on the
    /// calling thread. Hooks must be cheap and must not block.
    pub fn on_trigger<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut hooks = self.inner.hooks.lock();
        if self.is_triggered() {
            drop(hooks);
            hook();
            return;
        }
        hooks.push(Box::new(hook));
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("triggered", &self.is_triggered())
            .finish_non_exhaustive()
    }
}
