//! Sample sources and sinks.
//!
//! Jobs never talk to hardware directly. A [`SampleSource`] stands in for the
//! board's analog input and a [`SampleSink`] for its console, so the same
//! pipeline runs against scripted data in tests and a simulated converter in
//! the demo.

use crate::error::TaskResult;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// One scaled reading (a temperature in whole degrees).
pub type Sample = i32;

/// Producer of raw readings.
pub trait SampleSource: Send {
    /// Read one sample.
    ///
    /// `Ok(None)` means nothing is available this period.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TaskError::Source`] if the device fails.
    fn read_sample(&mut self) -> TaskResult<Option<Sample>>;
}

/// Consumer of processed values.
pub trait SampleSink: Send {
    /// Emit one value.
    ///
    /// # Errors
    ///
    /// Implementation-specific output failure.
    fn emit(&mut self, value: Sample) -> TaskResult;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn read_sample(&mut self) -> TaskResult<Option<Sample>> {
        (**self).read_sample()
    }
}

impl<S: SampleSink + ?Sized> SampleSink for Box<S> {
    fn emit(&mut self, value: Sample) -> TaskResult {
        (**self).emit(value)
    }
}

/// Replays a fixed list of samples.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    values: Vec<Sample>,
    position: usize,
    cycle: bool,
}

impl ScriptedSource {
    /// Replay `values` once, then report no data.
    #[must_use]
    pub fn new(values: impl Into<Vec<Sample>>) -> Self {
        Self {
            values: values.into(),
            position: 0,
            cycle: false,
        }
    }

    /// Replay `values` forever.
    #[must_use]
    pub fn cycling(values: impl Into<Vec<Sample>>) -> Self {
        Self {
            cycle: true,
            ..Self::new(values)
        }
    }

    /// Samples left before the end of the script.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.values.len().saturating_sub(self.position)
    }
}

impl SampleSource for ScriptedSource {
    fn read_sample(&mut self) -> TaskResult<Option<Sample>> {
        if self.cycle && self.position >= self.values.len() {
            self.position = 0;
        }
        let sample = self.values.get(self.position).copied();
        if sample.is_some() {
            self.position += 1;
        }
        Ok(sample)
    }
}

/// Maximum raw value of the 10-bit converter.
pub const ADC_MAX: u16 = 1_023;

/// Deterministic 10-bit converter producing a sawtooth.
///
/// The raw value is scaled the way the board firmware does it: raw to volts
/// over a 3.3 V reference, then volts to 0..100. The reference cancels, so
/// the scaling is done in integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedAdc {
    raw: u16,
    step: u16,
}

impl Default for SimulatedAdc {
    fn default() -> Self {
        Self::new(0, 31)
    }
}

impl SimulatedAdc {
    /// Create a converter starting at `start` and stepping by `step`.
    #[must_use]
    pub fn new(start: u16, step: u16) -> Self {
        Self {
            raw: start.min(ADC_MAX),
            step,
        }
    }

    /// Scale a raw reading to 0..=100.
    #[must_use]
    pub fn scale(raw: u16) -> Sample {
        i32::from(raw.min(ADC_MAX)) * 100 / i32::from(ADC_MAX)
    }
}

impl SampleSource for SimulatedAdc {
    fn read_sample(&mut self) -> TaskResult<Option<Sample>> {
        let raw = self.raw;
        let next = (u32::from(raw) + u32::from(self.step)) % (u32::from(ADC_MAX) + 1);
        self.raw = u16::try_from(next).unwrap_or(0);
        Ok(Some(Self::scale(raw)))
    }
}

/// Logs every value at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl SampleSink for LogSink {
    fn emit(&mut self, value: Sample) -> TaskResult {
        info!(mean = value, "Mean Temp: {value}");
        Ok(())
    }
}

/// Stores every value; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    values: Arc<Mutex<Vec<Sample>>>,
}

impl CollectingSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Values emitted so far.
    #[must_use]
    pub fn values(&self) -> Vec<Sample> {
        self.values.lock().clone()
    }
}

impl SampleSink for CollectingSink {
    fn emit(&mut self, value: Sample) -> TaskResult {
        self.values.lock().push(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_source_runs_dry() -> TaskResult {
        let mut source = ScriptedSource::new(vec![1, 2]);
        assert_eq!(source.read_sample()?, Some(1));
        assert_eq!(source.remaining(), 1);
        assert_eq!(source.read_sample()?, Some(2));
        assert_eq!(source.read_sample()?, None);
        assert_eq!(source.read_sample()?, None);
        Ok(())
    }

    #[test]
    fn test_scripted_source_cycles() -> TaskResult {
        let mut source = ScriptedSource::cycling(vec![7, 8]);
        let read: Vec<_> = (0..5)
            .map(|_| source.read_sample())
            .collect::<TaskResult<_>>()?;
        assert_eq!(read, vec![Some(7), Some(8), Some(7), Some(8), Some(7)]);
        Ok(())
    }

    #[test]
    fn test_adc_scaling_endpoints() {
        assert_eq!(SimulatedAdc::scale(0), 0);
        assert_eq!(SimulatedAdc::scale(ADC_MAX), 100);
        assert_eq!(SimulatedAdc::scale(512), 50);
        assert_eq!(SimulatedAdc::scale(u16::MAX), 100);
    }

    #[test]
    fn test_adc_ramp_wraps() -> TaskResult {
        let mut adc = SimulatedAdc::new(1_000, 20);
        assert_eq!(adc.read_sample()?, Some(SimulatedAdc::scale(1_000)));
        assert_eq!(adc.read_sample()?, Some(SimulatedAdc::scale(1_020)));
        assert_eq!(adc.read_sample()?, Some(SimulatedAdc::scale(16)));
        Ok(())
    }

    #[test]
    fn test_collecting_sink_shares_buffer() -> TaskResult {
        let sink = CollectingSink::new();
        let mut writer = sink.clone();
        writer.emit(3)?;
        writer.emit(4)?;
        assert_eq!(sink.values(), vec![3, 4]);
        Ok(())
    }
}
