//! Shared sequence counter.

use crate::error::TaskResult;
use rtlab_sync::{Guarded, ShutdownSignal};
use std::collections::BTreeMap;

/// Contents of the registry at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    /// Total increments.
    pub sequence: u64,
    /// Task that incremented last.
    pub last_writer: Option<String>,
    /// Increments per task.
    pub per_writer: BTreeMap<String, u64>,
}

/// Sequence number shared by several tasks.
///
/// Each increment takes the registry's binary semaphore, so the
/// read-modify-write of the counter and the writer bookkeeping is atomic
/// with respect to other tasks.
#[derive(Debug)]
pub struct SequenceRegistry {
    state: Guarded<RegistrySnapshot>,
}

impl SequenceRegistry {
    /// Create an empty registry.
    ///
    /// With `shutdown`, a task blocked on the registry lock is released when
    /// the signal fires.
    #[must_use]
    pub fn new(shutdown: Option<&ShutdownSignal>) -> Self {
        let state = match shutdown {
            Some(signal) => Guarded::with_shutdown("sequence", RegistrySnapshot::default(), signal),
            None => Guarded::new("sequence", RegistrySnapshot::default()),
        };
        Self { state }
    }

    /// Increment the sequence on behalf of `writer` and return the new value.
    ///
    /// # Errors
    ///
    /// Returns [`rtlab_sync::SyncError::Shutdown`] if shutdown fires while
    /// waiting for the lock.
    pub fn increment(&self, writer: &str) -> TaskResult<u64> {
        let mut state = self.state.lock()?;
        state.sequence = state.sequence.saturating_add(1);
        if state.last_writer.as_deref() != Some(writer) {
            state.last_writer = Some(writer.to_owned());
        }
        let count = state.per_writer.entry(writer.to_owned()).or_insert(0);
        *count = count.saturating_add(1);
        Ok(state.sequence)
    }

    /// Copy of the current contents.
    ///
    /// # Errors
    ///
    /// Same as [`SequenceRegistry::increment`].
    pub fn snapshot(&self) -> TaskResult<RegistrySnapshot> {
        Ok(self.state.lock()?.clone())
    }
}
