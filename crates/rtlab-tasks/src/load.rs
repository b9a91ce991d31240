//! Deterministic CPU load.
//!
//! Each activation of a loaded task burns a reproducible amount of CPU time
//! by integrating `f(x) = 1 / (1 + x²)` with the composite trapezoid rule.
//! The numeric result is irrelevant; only the amount of work matters, and
//! that depends on the configuration alone.

use crate::error::{TaskError, TaskResult};
use serde::{Deserialize, Serialize};
use std::hint::black_box;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

/// Integration parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Lower integration bound.
    pub lower: f64,
    /// Upper integration bound.
    pub upper: f64,
    /// Number of trapezoids; tunes the load.
    pub sub_intervals: u32,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            lower: 0.0,
            upper: 100.0,
            sub_intervals: 1_000_000,
        }
    }
}

impl LoadConfig {
    /// Validate the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidConfig`] for zero sub-intervals or
    /// non-finite / inverted bounds.
    pub fn validate(&self) -> TaskResult {
        if self.sub_intervals == 0 {
            return Err(TaskError::invalid_config(
                "load sub_intervals must be greater than 0",
            ));
        }
        if !self.lower.is_finite() || !self.upper.is_finite() || self.upper <= self.lower {
            return Err(TaskError::invalid_config(
                "load bounds must be finite with upper > lower",
            ));
        }
        Ok(())
    }
}

/// Result of one integration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Integration {
    /// Approximate integral.
    pub value: f64,
    /// Number of evaluations of `f`.
    pub evaluations: u64,
}

/// Timing recorded by the first [`LoadSimulator::simulate_load`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Wall time of the first run.
    pub elapsed: Duration,
    /// Integral computed on the first run.
    pub value: f64,
}

/// Shared load generator.
///
/// Safe to share between tasks through an `Arc`; the calibration is taken
/// by whichever task runs first.
#[derive(Debug)]
pub struct LoadSimulator {
    config: LoadConfig,
    calibration: OnceLock<Calibration>,
    runs: AtomicU64,
}

#[inline]
fn f(x: f64) -> f64 {
    1.0 / (1.0 + x * x)
}

impl LoadSimulator {
    /// Create a simulator.
    ///
    /// # Errors
    ///
    /// Same as [`LoadConfig::validate`].
    pub fn new(config: LoadConfig) -> TaskResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            calibration: OnceLock::new(),
            runs: AtomicU64::new(0),
        })
    }

    /// Integrate once without timing or logging.
    #[must_use]
    pub fn integrate(&self) -> Integration {
        let LoadConfig {
            lower,
            upper,
            sub_intervals,
        } = self.config;
        let step = (upper - lower) / f64::from(sub_intervals);

        let mut sum = f(lower) + f(upper);
        for i in 1..sub_intervals {
            sum += 2.0 * f(lower + f64::from(i) * step);
        }

        Integration {
            value: sum * step / 2.0,
            evaluations: u64::from(sub_intervals) + 1,
        }
    }

    /// Burn the configured amount of CPU and return how long it took.
    ///
    /// Only the first call on a simulator logs the result and records the
    /// [`Calibration`]; later calls do the same work silently.
    pub fn simulate_load(&self) -> Duration {
        let start = Instant::now();
        let result = black_box(self.integrate());
        let elapsed = start.elapsed();
        self.runs.fetch_add(1, Ordering::Relaxed);

        let calibration = Calibration {
            elapsed,
            value: result.value,
        };
        if self.calibration.set(calibration).is_ok() {
            info!(
                integral = result.value,
                elapsed_ns = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX),
                evaluations = result.evaluations,
                "load calibrated"
            );
        }
        elapsed
    }

    /// Timing of the first run, if any.
    #[must_use]
    pub fn calibration(&self) -> Option<Calibration> {
        self.calibration.get().copied()
    }

    /// Number of `simulate_load` calls so far.
    #[must_use]
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    /// Integration parameters.
    #[must_use]
    pub fn config(&self) -> &LoadConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> TaskResult<LoadSimulator> {
        LoadSimulator::new(LoadConfig {
            sub_intervals: 10_000,
            ..LoadConfig::default()
        })
    }

    #[test]
    fn test_integral_close_to_arctan() -> TaskResult {
        let load = small()?;
        let result = load.integrate();
        // ∫₀¹⁰⁰ 1/(1+x²) dx = atan(100)
        assert!((result.value - 100f64.atan()).abs() < 1e-3);
        assert_eq!(result.evaluations, 10_001);
        Ok(())
    }

    #[test]
    fn test_evaluations_depend_only_on_config() -> TaskResult {
        let load = small()?;
        let first = load.integrate();
        let second = load.integrate();
        assert_eq!(first.evaluations, second.evaluations);
        assert!((first.value - second.value).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn test_only_first_run_calibrates() -> TaskResult {
        let load = small()?;
        assert!(load.calibration().is_none());

        let first = load.simulate_load();
        let calibration = load.calibration().ok_or(TaskError::invalid_config("missing"))?;
        assert_eq!(calibration.elapsed, first);

        load.simulate_load();
        load.simulate_load();
        assert_eq!(load.calibration().map(|c| c.elapsed), Some(first));
        assert_eq!(load.runs(), 3);
        Ok(())
    }

    #[test]
    fn test_invalid_config() {
        assert!(
            LoadSimulator::new(LoadConfig {
                sub_intervals: 0,
                ..LoadConfig::default()
            })
            .is_err()
        );
        assert!(
            LoadSimulator::new(LoadConfig {
                lower: 5.0,
                upper: 5.0,
                ..LoadConfig::default()
            })
            .is_err()
        );
    }
}
