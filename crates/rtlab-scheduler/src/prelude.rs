//! Prelude module for common scheduler types.
//!
//! This module provides a convenient way to import the most commonly used
//! types from the scheduler crate.

pub use crate::clock::{Clock, MonotonicClock, SimulatedClock, Timestamp, Wake};
pub use crate::error::{SchedError, SchedResult};
pub use crate::jitter::{DEFAULT_WARM_UP, JitterBounds, JitterSample, JitterTracker};
pub use crate::periodic::{Activation, OverrunPolicy, PeriodicTimer};
pub use crate::rt_setup::{RtSetup, RtSetupReport, SetupOutcome};
