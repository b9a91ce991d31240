//! Error types for the synchronization fabric.

use thiserror::Error;

/// Errors returned by semaphores, guarded cells and handoffs.
///
/// Every variant is `Copy` so blocking waits on real-time threads can report
/// failures without allocating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SyncError {
    /// A bounded wait expired before a unit became available.
    #[error("Semaphore wait timed out")]
    Timeout,

    /// The shutdown signal fired while the caller was blocked.
    #[error("Shutdown requested while waiting")]
    Shutdown,

    /// A queued handoff already holds `capacity` unconsumed units.
    #[error("Handoff full ({capacity} pending units)")]
    Full {
        /// Configured queue capacity.
        capacity: u32,
    },

    /// Invalid construction parameter.
    #[error("Invalid synchronization config: {0}")]
    InvalidConfig(&'static str),
}

impl SyncError {
    /// Check if the caller should simply retry on its next loop iteration.
    ///
    /// Timeouts and back-pressure are routine; shutdown and configuration
    /// errors are not.
    #[must_use]
    pub fn is_recoverable(self) -> bool {
        matches!(self, SyncError::Timeout | SyncError::Full { .. })
    }
}

/// A specialized `Result` type for synchronization operations.
pub type SyncResult<T = ()> = Result<T, SyncError>;
