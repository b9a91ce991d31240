//! Real-time thread setup.
//!
//! Every step is best-effort: a task that cannot get real-time priority,
//! its requested core or locked memory keeps running in degraded mode, and
//! the caller decides how loudly to report it via [`RtSetupReport`].

#[cfg(target_os = "linux")]
use crate::linux as platform;

#[cfg(not(target_os = "linux"))]
use crate::fallback as platform;

/// Result of one setup step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetupOutcome {
    /// The step was not requested.
    #[default]
    NotRequested,
    /// The step succeeded.
    Applied,
    /// The platform has no equivalent.
    Unsupported,
    /// The OS rejected the request.
    Failed {
        /// OS error code.
        errno: i32,
    },
}

impl SetupOutcome {
    /// Check if the step was requested but not applied.
    #[must_use]
    pub fn is_degraded(self) -> bool {
        matches!(self, SetupOutcome::Unsupported | SetupOutcome::Failed { .. })
    }
}

/// Outcome of [`RtSetup::apply_current_thread`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RtSetupReport {
    /// `SCHED_FIFO` priority step.
    pub priority: SetupOutcome,
    /// Core pinning step.
    pub affinity: SetupOutcome,
    /// Memory locking step.
    pub memory_lock: SetupOutcome,
}

impl RtSetupReport {
    /// Check if any requested step failed.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.priority.is_degraded() || self.affinity.is_degraded() || self.memory_lock.is_degraded()
    }

    /// Emit one warning per degraded step.
    pub fn log_degraded(&self, task: &str) {
        if self.priority.is_degraded() {
            tracing::warn!(task, outcome = ?self.priority, "real-time priority not applied, running at normal priority");
        }
        if self.affinity.is_degraded() {
            tracing::warn!(task, outcome = ?self.affinity, "core pinning not applied, thread may migrate");
        }
        if self.memory_lock.is_degraded() {
            tracing::warn!(task, outcome = ?self.memory_lock, "memory not locked, page faults possible");
        }
    }
}

/// Real-time setup configuration.
///
/// Applied by a task thread to itself right after it starts. Priority and
/// affinity are immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RtSetup {
    /// `SCHED_FIFO` priority (higher = more urgent), `None` to keep the
    /// default policy.
    pub priority: Option<i32>,

    /// Core index to pin the thread to.
    pub cpu_affinity: Option<usize>,

    /// Lock all current and future memory pages.
    ///
    /// This is process-wide; one task requesting it is enough.
    pub lock_memory: bool,
}

impl RtSetup {
    /// Create a setup that changes nothing.
    #[must_use]
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Set `SCHED_FIFO` priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Set the core to pin to.
    #[must_use]
    pub fn with_cpu_affinity(mut self, core: usize) -> Self {
        self.cpu_affinity = Some(core);
        self
    }

    /// Set memory locking.
    #[must_use]
    pub fn with_lock_memory(mut self, enabled: bool) -> Self {
        self.lock_memory = enabled;
        self
    }

    /// Check if any RT features are requested.
    #[must_use]
    pub fn has_rt_features(&self) -> bool {
        self.priority.is_some() || self.cpu_affinity.is_some() || self.lock_memory
    }

    /// Apply the requested steps to the calling thread.
    ///
    /// Never fails: each step reports its own outcome.
    pub fn apply_current_thread(&self) -> RtSetupReport {
        RtSetupReport {
            priority: self
                .priority
                .map_or(SetupOutcome::NotRequested, platform::set_fifo_priority),
            affinity: self
                .cpu_affinity
                .map_or(SetupOutcome::NotRequested, platform::pin_to_core),
            memory_lock: if self.lock_memory {
                platform::lock_memory()
            } else {
                SetupOutcome::NotRequested
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal() {
        let setup = RtSetup::minimal();
        assert!(setup.priority.is_none());
        assert!(setup.cpu_affinity.is_none());
        assert!(!setup.lock_memory);
        assert!(!setup.has_rt_features());
    }

    #[test]
    fn test_builder_pattern() {
        let setup = RtSetup::minimal()
            .with_priority(50)
            .with_cpu_affinity(0)
            .with_lock_memory(true);

        assert_eq!(setup.priority, Some(50));
        assert_eq!(setup.cpu_affinity, Some(0));
        assert!(setup.lock_memory);
        assert!(setup.has_rt_features());
    }

    #[test]
    fn test_minimal_apply_is_noop() {
        let report = RtSetup::minimal().apply_current_thread();
        assert_eq!(report, RtSetupReport::default());
        assert!(!report.is_degraded());
    }

    #[test]
    fn test_degraded_classification() {
        assert!(!SetupOutcome::NotRequested.is_degraded());
        assert!(!SetupOutcome::Applied.is_degraded());
        assert!(SetupOutcome::Unsupported.is_degraded());
        assert!(SetupOutcome::Failed { errno: 1 }.is_degraded());

        let report = RtSetupReport {
            affinity: SetupOutcome::Failed { errno: 22 },
            ..RtSetupReport::default()
        };
        assert!(report.is_degraded());
    }

    #[test]
    fn test_pinning_outcome_is_reported() {
        // Core 0 exists everywhere, but containers may still refuse it.
        let outcome = std::thread::spawn(|| {
            RtSetup::minimal()
                .with_cpu_affinity(0)
                .apply_current_thread()
                .affinity
        })
        .join();
        assert!(matches!(
            outcome,
            Ok(SetupOutcome::Applied | SetupOutcome::Failed { .. } | SetupOutcome::Unsupported)
        ));
    }
}
