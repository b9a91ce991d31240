//! Task lifecycle state machine.
//!
//! ```text
//! Created ──► Started ──► PeriodicRunning ──┐
//!                    └──► BlockedWaiting  ──┴──► Terminated
//! ```
//!
//! The state is written only by the task thread through its
//! [`TaskStateWriter`] and can be read lock-free from anywhere through a
//! [`TaskStateHandle`]. Dropping the writer marks the task terminated, so a
//! thread that unwinds never leaves a stale running state behind.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Execution state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TaskState {
    /// Descriptor allocated, thread not yet running.
    Created = 0,
    /// Thread running, setting itself up.
    Started = 1,
    /// Periodic task alternating between deadline wait and job.
    PeriodicRunning = 2,
    /// Sporadic task blocked on its trigger.
    BlockedWaiting = 3,
    /// Loop exited; absorbing.
    Terminated = 4,
}

impl TaskState {
    /// Check whether `self → next` is a legal edge.
    ///
    /// Staying in a running state is legal; leaving `Terminated` is not.
    #[must_use]
    pub fn can_transition_to(self, next: TaskState) -> bool {
        use TaskState::{BlockedWaiting, Created, PeriodicRunning, Started, Terminated};
        matches!(
            (self, next),
            (Created, Started | Terminated)
                | (Started, PeriodicRunning | BlockedWaiting | Terminated)
                | (PeriodicRunning, PeriodicRunning | Terminated)
                | (BlockedWaiting, BlockedWaiting | Terminated)
        )
    }

    /// Check if the state is absorbing.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == TaskState::Terminated
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => TaskState::Created,
            1 => TaskState::Started,
            2 => TaskState::PeriodicRunning,
            3 => TaskState::BlockedWaiting,
            _ => TaskState::Terminated,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Created => "created",
            TaskState::Started => "started",
            TaskState::PeriodicRunning => "periodic-running",
            TaskState::BlockedWaiting => "blocked-waiting",
            TaskState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Exclusive writer of a task's state. Not `Clone`.
#[derive(Debug)]
pub struct TaskStateWriter {
    cell: Arc<AtomicU8>,
}

/// Lock-free reader of a task's state.
#[derive(Debug, Clone)]
pub struct TaskStateHandle {
    cell: Arc<AtomicU8>,
}

/// Create a state cell in [`TaskState::Created`].
#[must_use]
pub fn state_cell() -> (TaskStateWriter, TaskStateHandle) {
    let cell = Arc::new(AtomicU8::new(TaskState::Created as u8));
    (
        TaskStateWriter {
            cell: Arc::clone(&cell),
        },
        TaskStateHandle { cell },
    )
}

impl TaskStateWriter {
    /// Current state.
    #[must_use]
    pub fn get(&self) -> TaskState {
        TaskState::from_u8(self.cell.load(Ordering::Acquire))
    }

    /// Move to `next` if the edge is legal.
    ///
    /// Returns `false` and leaves the state unchanged otherwise.
    pub fn advance(&self, next: TaskState) -> bool {
        let current = self.get();
        if !current.can_transition_to(next) {
            tracing::warn!(from = %current, to = %next, "illegal task state transition ignored");
            return false;
        }
        self.cell.store(next as u8, Ordering::Release);
        true
    }
}

impl Drop for TaskStateWriter {
    fn drop(&mut self) {
        self.cell
            .store(TaskState::Terminated as u8, Ordering::Release);
    }
}

impl TaskStateHandle {
    /// Current state.
    #[must_use]
    pub fn get(&self) -> TaskState {
        TaskState::from_u8(self.cell.load(Ordering::Acquire))
    }
}
