//! Windowed averaging for the acquisition pipeline.

use crate::error::{TaskError, TaskResult};
use crate::ports::Sample;

/// Default number of samples averaged into one output.
pub const DEFAULT_WINDOW: u32 = 5;

/// Collects samples and yields their integer mean once per full window.
///
/// The window is tumbling: after an output the buffer starts empty, so
/// exactly one mean is produced per `window` inputs and never earlier.
#[derive(Debug, Clone)]
pub struct Averager {
    window: usize,
    buffer: Vec<Sample>,
}

impl Averager {
    /// Create an averager over `window` samples.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidConfig`] if `window` is zero.
    pub fn new(window: u32) -> TaskResult<Self> {
        let window = usize::try_from(window)
            .ok()
            .filter(|&w| w > 0)
            .ok_or_else(|| TaskError::invalid_config("averaging window must be greater than 0"))?;
        Ok(Self {
            window,
            buffer: Vec::with_capacity(window),
        })
    }

    /// Add a sample; returns the mean when the window fills.
    ///
    /// The mean truncates toward zero.
    pub fn push(&mut self, sample: Sample) -> Option<Sample> {
        self.buffer.push(sample);
        if self.buffer.len() < self.window {
            return None;
        }

        let sum: i64 = self.buffer.iter().copied().map(i64::from).sum();
        self.buffer.clear();
        let count = i64::try_from(self.window).ok()?;
        Sample::try_from(sum / count).ok()
    }

    /// Samples buffered toward the next output.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Window size.
    #[must_use]
    pub fn window(&self) -> usize {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_of_five() -> TaskResult {
        let mut averager = Averager::new(5)?;
        let outputs: Vec<_> = [10, 20, 30, 40].into_iter().map(|s| averager.push(s)).collect();
        assert_eq!(outputs, vec![None, None, None, None]);
        assert_eq!(averager.push(50), Some(30));
        assert_eq!(averager.buffered(), 0);
        Ok(())
    }

    #[test]
    fn test_mean_truncates() -> TaskResult {
        let mut averager = Averager::new(3)?;
        averager.push(1);
        averager.push(1);
        assert_eq!(averager.push(2), Some(1));

        averager.push(-1);
        averager.push(-1);
        assert_eq!(averager.push(-2), Some(-1));
        Ok(())
    }

    #[test]
    fn test_no_overflow_on_extremes() -> TaskResult {
        let mut averager = Averager::new(2)?;
        averager.push(i32::MAX);
        assert_eq!(averager.push(i32::MAX), Some(i32::MAX));
        Ok(())
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(matches!(Averager::new(0), Err(TaskError::InvalidConfig(_))));
    }
}
