//! Error types for the scheduler crate.

use thiserror::Error;

/// Scheduling error codes (pre-allocated for the RT path).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SchedError {
    /// Period is zero or does not fit in 64-bit nanoseconds
    #[error("Invalid period: must be non-zero and below u64::MAX nanoseconds")]
    InvalidPeriod,
    /// Jitter warm-up window shorter than two activations
    #[error("Invalid warm-up: at least 2 activations are required")]
    InvalidWarmUp,
    /// `wait_next_period` called before the schedule was anchored
    #[error("Periodic schedule not started")]
    NotStarted,
    /// The previous job ran past one or more release points
    #[error("Deadline overrun: {missed} release point(s) missed")]
    Overrun {
        /// Number of deadlines that elapsed before the wait was entered.
        missed: u64,
    },
    /// Deadline arithmetic left the representable range
    #[error("Deadline computation overflowed")]
    DeadlineOverflow,
    /// Shutdown was requested during the deadline wait
    #[error("Shutdown requested")]
    Shutdown,
    /// The platform sleep call failed
    #[error("Platform sleep failed")]
    SleepFailed,
}

impl SchedError {
    /// Check if this error should terminate the periodic task.
    ///
    /// Shutdown is not fatal: it is the normal way out of the loop.
    #[must_use]
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            SchedError::Overrun { .. } | SchedError::DeadlineOverflow | SchedError::SleepFailed
        )
    }

    /// Check if the caller can fix its usage and retry on the same timer.
    ///
    /// Construction errors are neither fatal nor recoverable: they never
    /// reach a running task.
    #[must_use]
    pub fn is_recoverable(self) -> bool {
        matches!(self, SchedError::NotStarted)
    }
}

/// RT-safe result type
pub type SchedResult<T = ()> = Result<T, SchedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrun_is_fatal() {
        assert!(SchedError::Overrun { missed: 1 }.is_fatal());
        assert!(!SchedError::Overrun { missed: 1 }.is_recoverable());
    }

    #[test]
    fn test_shutdown_neither_fatal_nor_recoverable() {
        assert!(!SchedError::Shutdown.is_fatal());
        assert!(!SchedError::Shutdown.is_recoverable());
    }

    #[test]
    fn test_classification_of_setup_errors() {
        assert!(SchedError::NotStarted.is_recoverable());
        assert!(!SchedError::InvalidPeriod.is_recoverable());
        assert!(!SchedError::InvalidPeriod.is_fatal());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            SchedError::Overrun { missed: 3 }.to_string(),
            "Deadline overrun: 3 release point(s) missed"
        );
    }
}
