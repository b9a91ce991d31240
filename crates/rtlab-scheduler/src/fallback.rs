//! Fallback platform implementation for non-Linux systems.
//!
//! Sleeping uses `std::thread::sleep`; real-time priority, core pinning and
//! memory locking are reported as unsupported.

use crate::error::SchedResult;
use crate::rt_setup::SetupOutcome;
use std::time::Instant;

/// `SCHED_FIFO` is not available.
pub fn set_fifo_priority(_priority: i32) -> SetupOutcome {
    SetupOutcome::Unsupported
}

/// Per-thread affinity is not available.
pub fn pin_to_core(_core: usize) -> SetupOutcome {
    SetupOutcome::Unsupported
}

/// Memory locking is not available.
pub fn lock_memory() -> SetupOutcome {
    SetupOutcome::Unsupported
}

/// Fallback sleep using standard `thread::sleep`.
pub fn sleep_until(target: Instant) -> SchedResult {
    let remaining = target.saturating_duration_since(Instant::now());
    if !remaining.is_zero() {
        std::thread::sleep(remaining);
    }
    Ok(())
}
