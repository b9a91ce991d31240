//! Absolute-deadline periodic scheduling and jitter tracking for real-time tasks.
//!
//! This crate provides the timing half of a periodic real-time task:
//!
//! - **Clock**: monotonic time source with a shutdown-aware `sleep_until`
//!   (`MonotonicClock` for real time, `SimulatedClock` for tests)
//! - **PeriodicTimer**: drift-free release points `start + k * period` with
//!   overrun detection
//! - **JitterTracker**: min/max inter-activation interval after a warm-up
//!   window, plus percentiles
//! - **RtSetup**: best-effort `SCHED_FIFO` priority, core pinning and memory
//!   locking for the calling thread
//!
//! # RT-Safety Guarantees
//!
//! - **No heap allocations** in `wait_next_period` or `record_activation`
//! - **One suspension point**: the clock's deadline wait
//! - **Deterministic behavior**: deadlines depend only on the anchor and period
//!
//! # Example
//!
//! ```no_run
//! use rtlab_scheduler::{JitterTracker, PeriodicTimer, RtSetup, SchedError};
//! use std::time::Duration;
//!
//! RtSetup::minimal().with_priority(50).apply_current_thread().log_degraded("demo");
//!
//! let mut timer = PeriodicTimer::new(Duration::from_millis(100))?;
//! let mut jitter = JitterTracker::new();
//! timer.start_periodic();
//!
//! loop {
//!     let activation = match timer.wait_next_period() {
//!         Ok(activation) => activation,
//!         Err(SchedError::Overrun { missed }) => {
//!             eprintln!("missed {missed} release point(s)");
//!             break;
//!         }
//!         Err(e) => return Err(e),
//!     };
//!     if jitter.record_activation(activation.woke_at).bounds_changed {
//!         println!("{:?}", jitter.bounds());
//!     }
//! }
//! # Ok::<(), SchedError>(())
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]
#![deny(static_mut_refs)]
#![deny(unused_must_use)]

pub mod clock;
pub mod error;
pub mod jitter;
pub mod periodic;
pub mod rt_setup;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(not(target_os = "linux"))]
mod fallback;

pub mod prelude;

pub use clock::{Clock, MonotonicClock, SimulatedClock, Timestamp, Wake};
pub use error::{SchedError, SchedResult};
pub use jitter::{JitterBounds, JitterSample, JitterTracker};
pub use periodic::{Activation, OverrunPolicy, PeriodicTimer};
pub use rt_setup::{RtSetup, RtSetupReport, SetupOutcome};
