//! Error types for task construction and execution.

use rtlab_scheduler::SchedError;
use rtlab_sync::SyncError;
use std::io;
use thiserror::Error;

/// Errors that can occur while building or running tasks.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The OS refused to create the task thread.
    #[error("Failed to spawn task '{name}': {source}")]
    Spawn {
        /// Task name.
        name: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Periodic scheduling failed.
    #[error(transparent)]
    Sched(#[from] SchedError),

    /// A semaphore, guarded cell or handoff failed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The sample source could not deliver a reading.
    #[error("Sample source failed: {0}")]
    Source(String),
}

impl TaskError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }

    /// Check if the task loop should retry instead of stopping.
    ///
    /// Synchronization timeouts and handoff back-pressure are routine.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TaskError::Sync(e) if e.is_recoverable())
    }

    /// Check if the error means shutdown was requested.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        matches!(
            self,
            TaskError::Sync(SyncError::Shutdown) | TaskError::Sched(SchedError::Shutdown)
        )
    }
}

/// Result type for task operations.
pub type TaskResult<T = ()> = Result<T, TaskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_recoverable() {
        let err = TaskError::from(SyncError::Timeout);
        assert!(err.is_recoverable());
        assert!(!err.is_shutdown());
    }

    #[test]
    fn test_shutdown_detection() {
        assert!(TaskError::from(SyncError::Shutdown).is_shutdown());
        assert!(TaskError::from(SchedError::Shutdown).is_shutdown());
        assert!(!TaskError::from(SchedError::Overrun { missed: 1 }).is_shutdown());
    }

    #[test]
    fn test_display_is_transparent() {
        let err = TaskError::from(SchedError::Overrun { missed: 2 });
        assert_eq!(err.to_string(), "Deadline overrun: 2 release point(s) missed");
        assert_eq!(
            TaskError::invalid_config("no tasks").to_string(),
            "Invalid configuration: no tasks"
        );
    }
}
