//! Inter-activation jitter statistics.
//!
//! The tracker measures the interval between consecutive activations and
//! keeps its running minimum and maximum. The first `W` activations are a
//! warm-up: intervals observed before iteration `W` absorb startup
//! transients and are discarded, the interval at iteration `W` seeds both
//! bounds, and later intervals widen them.

use crate::clock::Timestamp;
use crate::error::{SchedError, SchedResult};
use std::vec::Vec;

/// Default warm-up window.
pub const DEFAULT_WARM_UP: u32 = 10;

/// Default number of post-warm-up intervals kept for percentiles.
pub const DEFAULT_MAX_SAMPLES: usize = 1_024;

/// Observed inter-activation interval bounds, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitterBounds {
    /// Shortest interval since warm-up.
    pub min_ns: u64,
    /// Longest interval since warm-up.
    pub max_ns: u64,
}

impl JitterBounds {
    /// `max - min`.
    #[must_use]
    pub fn spread_ns(&self) -> u64 {
        self.max_ns.saturating_sub(self.min_ns)
    }

    /// Largest distance of either bound from the nominal `period_ns`.
    #[must_use]
    pub fn max_deviation_ns(&self, period_ns: u64) -> u64 {
        self.min_ns.abs_diff(period_ns).max(self.max_ns.abs_diff(period_ns))
    }
}

/// What one [`JitterTracker::record_activation`] call observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitterSample {
    /// 1-based activation count.
    pub iteration: u64,
    /// Interval since the previous activation (`None` on the first).
    pub delta_ns: Option<u64>,
    /// Whether this sample seeded or widened the bounds.
    pub bounds_changed: bool,
}

/// Per-task jitter tracker.
///
/// # RT-Safety
///
/// - `record_activation` is O(1) and allocation-free after construction
/// - Percentile queries reuse a preallocated scratch buffer
#[derive(Debug, Clone)]
pub struct JitterTracker {
    warm_up: u32,
    iteration: u64,
    last: Option<Timestamp>,
    last_delta_ns: Option<u64>,
    bounds: Option<JitterBounds>,

    /// Recent post-warm-up intervals (ring buffer)
    samples: Vec<u64>,
    max_samples: usize,
    next_sample_index: usize,
    scratch: Vec<u64>,
}

impl Default for JitterTracker {
    fn default() -> Self {
        Self::build(DEFAULT_WARM_UP, DEFAULT_MAX_SAMPLES)
    }
}

impl JitterTracker {
    /// Create a tracker with the default warm-up of 10 activations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker with a custom warm-up window.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::InvalidWarmUp`] if `warm_up < 2`: the first
    /// activation has no predecessor, so the earliest seedable interval is
    /// at iteration 2.
    pub fn with_warm_up(warm_up: u32) -> SchedResult<Self> {
        Self::with_capacity(warm_up, DEFAULT_MAX_SAMPLES)
    }

    /// Create a tracker with a custom warm-up and percentile sample capacity.
    ///
    /// # Errors
    ///
    /// Same as [`JitterTracker::with_warm_up`].
    pub fn with_capacity(warm_up: u32, max_samples: usize) -> SchedResult<Self> {
        if warm_up < 2 {
            return Err(SchedError::InvalidWarmUp);
        }
        Ok(Self::build(warm_up, max_samples))
    }

    fn build(warm_up: u32, max_samples: usize) -> Self {
        Self {
            warm_up,
            iteration: 0,
            last: None,
            last_delta_ns: None,
            bounds: None,
            samples: Vec::with_capacity(max_samples),
            max_samples,
            next_sample_index: 0,
            scratch: Vec::with_capacity(max_samples),
        }
    }

    /// Record an activation observed at `now`.
    pub fn record_activation(&mut self, now: Timestamp) -> JitterSample {
        self.iteration = self.iteration.saturating_add(1);
        let previous = self.last.replace(now);

        let Some(previous) = previous else {
            return JitterSample {
                iteration: self.iteration,
                delta_ns: None,
                bounds_changed: false,
            };
        };

        let delta = now.saturating_nanos_since(previous);
        self.last_delta_ns = Some(delta);

        let warm_up = u64::from(self.warm_up);
        let bounds_changed = if self.iteration < warm_up {
            false
        } else {
            self.push_sample(delta);
            match &mut self.bounds {
                Some(bounds) => {
                    let widened = delta < bounds.min_ns || delta > bounds.max_ns;
                    bounds.min_ns = bounds.min_ns.min(delta);
                    bounds.max_ns = bounds.max_ns.max(delta);
                    widened
                }
                slot @ None => {
                    *slot = Some(JitterBounds {
                        min_ns: delta,
                        max_ns: delta,
                    });
                    true
                }
            }
        };

        JitterSample {
            iteration: self.iteration,
            delta_ns: Some(delta),
            bounds_changed,
        }
    }

    fn push_sample(&mut self, delta: u64) {
        if self.max_samples == 0 {
            return;
        }

        if self.samples.len() < self.max_samples {
            self.samples.push(delta);
        } else if let Some(slot) = self.samples.get_mut(self.next_sample_index) {
            *slot = delta;
            self.next_sample_index = (self.next_sample_index + 1) % self.max_samples;
        }
    }

    /// Min/max interval bounds, `None` until the warm-up completes.
    #[must_use]
    pub fn bounds(&self) -> Option<JitterBounds> {
        self.bounds
    }

    /// `max - min`, `None` until the warm-up completes.
    #[must_use]
    pub fn spread_ns(&self) -> Option<u64> {
        self.bounds.map(|b| b.spread_ns())
    }

    /// Largest deviation of either bound from `period_ns`.
    #[must_use]
    pub fn max_deviation_ns(&self, period_ns: u64) -> Option<u64> {
        self.bounds.map(|b| b.max_deviation_ns(period_ns))
    }

    /// Calculate p50 (median) interval in nanoseconds.
    pub fn p50_ns(&mut self) -> Option<u64> {
        self.percentile_ns(0.50)
    }

    /// Calculate p99 interval in nanoseconds.
    pub fn p99_ns(&mut self) -> Option<u64> {
        self.percentile_ns(0.99)
    }

    /// Calculate an arbitrary percentile (0.0 to 1.0) of the recent
    /// post-warm-up intervals.
    ///
    /// Uses quickselect for O(n) average-case performance.
    pub fn percentile_ns(&mut self, percentile: f64) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }
        let percentile = percentile.clamp(0.0, 1.0);

        self.scratch.clear();
        self.scratch.extend_from_slice(&self.samples);

        let len = self.scratch.len();
        let index = ((len as f64 * percentile) as usize).min(len.saturating_sub(1));
        let (_, value, _) = self.scratch.select_nth_unstable(index);
        Some(*value)
    }

    /// Activations recorded so far.
    #[inline]
    #[must_use]
    pub fn iterations(&self) -> u64 {
        self.iteration
    }

    /// Warm-up window.
    #[inline]
    #[must_use]
    pub fn warm_up(&self) -> u32 {
        self.warm_up
    }

    /// Most recent interval, including warm-up intervals.
    #[inline]
    #[must_use]
    pub fn last_delta_ns(&self) -> Option<u64> {
        self.last_delta_ns
    }

    /// Number of intervals currently kept for percentiles.
    #[inline]
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Forget all observations; the warm-up starts again.
    pub fn reset(&mut self) {
        self.iteration = 0;
        self.last = None;
        self.last_delta_ns = None;
        self.bounds = None;
        self.samples.clear();
        self.next_sample_index = 0;
        self.scratch.clear();
    }
}
