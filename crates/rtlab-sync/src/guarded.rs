//! Values reachable only while holding a binary semaphore.
//!
//! [`Guarded`] pairs a value with the binary semaphore that protects it. The
//! value has no accessor other than [`Guarded::lock`], so "only touched while
//! the semaphore is held" is enforced by the type rather than by convention.

use crate::error::SyncResult;
use crate::semaphore::{Permit, Semaphore};
use crate::shutdown::ShutdownSignal;
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::time::Duration;

/// A value guarded by a binary semaphore initialised to 1.
///
/// The inner `Mutex` is never contended: the semaphore serializes access
/// first, and the mutex only provides safe interior mutability.
///
/// # Example
///
/// ```
/// use rtlab_sync::Guarded;
///
/// let counter = Guarded::new("sequence", 0u64);
/// {
///     let mut value = counter.lock()?;
///     *value += 1;
/// }
/// assert_eq!(*counter.lock()?, 1);
/// # Ok::<(), rtlab_sync::SyncError>(())
/// ```
pub struct Guarded<T> {
    semaphore: Semaphore,
    value: Mutex<T>,
}

impl<T> Guarded<T> {
    /// Guard `value` with a new binary semaphore named `name`.
    pub fn new(name: impl Into<String>, value: T) -> Self {
        Self {
            semaphore: Semaphore::binary(name, true),
            value: Mutex::new(value),
        }
    }

    /// Like [`Guarded::new`], but blocked lockers are woken by `shutdown`.
    pub fn with_shutdown(name: impl Into<String>, value: T, shutdown: &ShutdownSignal) -> Self {
        Self {
            semaphore: Semaphore::with_parts(name.into(), 1, 1, Some(shutdown.clone())),
            value: Mutex::new(value),
        }
    }

    /// Acquire the guarding semaphore and return access to the value.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Shutdown`] if shutdown fires while blocked.
    pub fn lock(&self) -> SyncResult<GuardedRef<'_, T>> {
        let permit = self.semaphore.acquire_guard()?;
        Ok(GuardedRef {
            value: self.value.lock(),
            _permit: permit,
        })
    }

    /// Like [`Guarded::lock`] with a bounded wait.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Timeout`] if the semaphore stayed held.
    pub fn lock_timeout(&self, timeout: Duration) -> SyncResult<GuardedRef<'_, T>> {
        let permit = self.semaphore.acquire_guard_timeout(timeout)?;
        Ok(GuardedRef {
            value: self.value.lock(),
            _permit: permit,
        })
    }

    /// Lock without blocking.
    pub fn try_lock(&self) -> Option<GuardedRef<'_, T>> {
        if !self.semaphore.try_acquire() {
            return None;
        }
        Some(GuardedRef {
            value: self.value.lock(),
            _permit: Permit::adopt(&self.semaphore),
        })
    }

    /// The guarding semaphore.
    pub fn semaphore(&self) -> &Semaphore {
        &self.semaphore
    }

    /// Consume the cell and return the value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: Default> Default for Guarded<T> {
    fn default() -> Self {
        Self::new("guarded", T::default())
    }
}

impl<T> fmt::Debug for Guarded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guarded")
            .field("semaphore", &self.semaphore)
            .finish_non_exhaustive()
    }
}

/// Access to a [`Guarded`] value; releases the semaphore on drop.
#[must_use = "dropping the guard releases the semaphore immediately"]
pub struct GuardedRef<'a, T> {
    // Declared first so the value lock is dropped before the permit.
    value: MutexGuard<'a, T>,
    _permit: Permit<'a>,
}

impl<T> Deref for GuardedRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for GuardedRef<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for GuardedRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GuardedRef").field(&*self.value).finish()
    }
}
