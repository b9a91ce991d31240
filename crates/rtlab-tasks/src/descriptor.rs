//! Task descriptors.

use crate::error::{TaskError, TaskResult};
use crate::load::LoadSimulator;
use rtlab_scheduler::RtSetup;
use std::sync::Arc;
use std::time::Duration;

/// How a task is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationKind {
    /// Released at `start + k * period`.
    Periodic {
        /// Activation period.
        period: Duration,
    },
    /// Released by its job's own blocking wait (a semaphore or handoff).
    Sporadic,
}

/// Static description of a task.
///
/// Immutable once handed to the runtime.
#[derive(Debug, Clone)]
pub struct TaskDescriptor {
    name: String,
    priority: i32,
    activation: ActivationKind,
    affinity: Option<usize>,
    load: Option<Arc<LoadSimulator>>,
}

impl TaskDescriptor {
    /// Describe a periodic task.
    #[must_use]
    pub fn periodic(name: impl Into<String>, period: Duration) -> Self {
        Self::new(name, ActivationKind::Periodic { period })
    }

    /// Describe a sporadic task.
    #[must_use]
    pub fn sporadic(name: impl Into<String>) -> Self {
        Self::new(name, ActivationKind::Sporadic)
    }

    fn new(name: impl Into<String>, activation: ActivationKind) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            activation,
            affinity: None,
            load: None,
        }
    }

    /// Set the priority (higher = more urgent).
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Pin the task to `core`.
    #[must_use]
    pub fn with_affinity(mut self, core: usize) -> Self {
        self.affinity = Some(core);
        self
    }

    /// Run `load` after every activation.
    #[must_use]
    pub fn with_load(mut self, load: Arc<LoadSimulator>) -> Self {
        self.load = Some(load);
        self
    }

    /// Validate the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidConfig`] for an empty name, a name the OS
    /// cannot use for a thread, or a zero period.
    pub fn validate(&self) -> TaskResult {
        if self.name.is_empty() {
            return Err(TaskError::invalid_config("task name must not be empty"));
        }
        if self.name.contains('\0') {
            return Err(TaskError::InvalidConfig(format!(
                "task name {:?} contains a NUL byte",
                self.name
            )));
        }
        if let ActivationKind::Periodic { period } = self.activation
            && period.is_zero()
        {
            return Err(TaskError::InvalidConfig(format!(
                "task '{}' has a zero period",
                self.name
            )));
        }
        Ok(())
    }

    /// Thread setup for this task.
    ///
    /// Priority is only requested when `realtime` is enabled; affinity is
    /// always honoured.
    #[must_use]
    pub fn rt_setup(&self, realtime: bool, lock_memory: bool) -> RtSetup {
        RtSetup {
            priority: realtime.then_some(self.priority),
            cpu_affinity: self.affinity,
            lock_memory,
        }
    }

    /// Task name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Priority.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Activation kind.
    #[must_use]
    pub fn activation(&self) -> ActivationKind {
        self.activation
    }

    /// Core the task is pinned to.
    #[must_use]
    pub fn affinity(&self) -> Option<usize> {
        self.affinity
    }

    /// Shared load simulator.
    #[must_use]
    pub fn load(&self) -> Option<&Arc<LoadSimulator>> {
        self.load.as_ref()
    }
}
