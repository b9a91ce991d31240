//! Prelude module for common synchronization types.

pub use crate::error::{SyncError, SyncResult};
pub use crate::guarded::{Guarded, GuardedRef};
pub use crate::handoff::{Handoff, HandoffMode, Publish};
pub use crate::semaphore::{Permit, Release, Semaphore, SemaphoreBuilder};
pub use crate::shutdown::ShutdownSignal;
