//! Job bodies run by the task runtime.
//!
//! A job is the per-activation work of a task. Periodic tasks call it once per
//! release point; sporadic tasks call it in a loop and rely on the job's own
//! blocking receive to pace them.

use crate::error::TaskResult;
use crate::pipeline::Averager;
use crate::ports::{Sample, SampleSink, SampleSource};
use crate::registry::SequenceRegistry;
use rtlab_scheduler::Activation;
use rtlab_sync::{Handoff, Publish, ShutdownSignal, SyncError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-call context handed to a [`Job`].
#[derive(Debug, Clone, Copy)]
pub struct JobContext<'a> {
    /// Name of the running task.
    pub task: &'a str,
    /// Release point of this call (periodic tasks only).
    pub activation: Option<Activation>,
    /// Runtime-wide shutdown signal.
    pub shutdown: &'a ShutdownSignal,
    /// Bound on blocking receives; `None` blocks until data or shutdown.
    pub sync_timeout: Option<Duration>,
    /// 1-based call count.
    pub iteration: u64,
}

/// Work executed once per activation.
pub trait Job: Send {
    /// Run one activation.
    ///
    /// # Errors
    ///
    /// Recoverable errors (see [`crate::TaskError::is_recoverable`]) make the
    /// runtime retry; anything else terminates the task.
    fn execute(&mut self, ctx: &JobContext<'_>) -> TaskResult;
}

impl<F> Job for F
where
    F: FnMut(&JobContext<'_>) -> TaskResult + Send,
{
    fn execute(&mut self, ctx: &JobContext<'_>) -> TaskResult {
        self(ctx)
    }
}

/// Does nothing; the task exists to be measured.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleJob;

impl Job for IdleJob {
    fn execute(&mut self, _ctx: &JobContext<'_>) -> TaskResult {
        Ok(())
    }
}

/// Increments a shared sequence number.
#[derive(Debug, Clone)]
pub struct CounterJob {
    registry: Arc<SequenceRegistry>,
}

impl CounterJob {
    /// Create a job incrementing `registry`.
    #[must_use]
    pub fn new(registry: Arc<SequenceRegistry>) -> Self {
        Self { registry }
    }
}

impl Job for CounterJob {
    fn execute(&mut self, ctx: &JobContext<'_>) -> TaskResult {
        let sequence = self.registry.increment(ctx.task)?;
        debug!(task = ctx.task, sequence, "sequence incremented");
        Ok(())
    }
}

fn receive(input: &Handoff<Sample>, ctx: &JobContext<'_>) -> TaskResult<Sample> {
    let value = match ctx.sync_timeout {
        Some(timeout) => input.receive_timeout(timeout)?,
        None => input.receive()?,
    };
    Ok(value)
}

fn forward(output: &Handoff<Sample>, ctx: &JobContext<'_>, value: Sample) -> TaskResult {
    match output.publish(value) {
        Ok(Publish::Delivered) => Ok(()),
        Ok(Publish::Replaced) => {
            debug!(task = ctx.task, value, "unread value replaced");
            Ok(())
        }
        Err(SyncError::Full { capacity }) => {
            warn!(task = ctx.task, value, capacity, "consumer behind, value dropped");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Reads one sample per activation and publishes it.
#[derive(Debug)]
pub struct AcquisitionJob<S> {
    source: S,
    output: Arc<Handoff<Sample>>,
}

impl<S: SampleSource> AcquisitionJob<S> {
    /// Create a job reading `source` into `output`.
    #[must_use]
    pub fn new(source: S, output: Arc<Handoff<Sample>>) -> Self {
        Self { source, output }
    }
}

impl<S: SampleSource> Job for AcquisitionJob<S> {
    fn execute(&mut self, ctx: &JobContext<'_>) -> TaskResult {
        match self.source.read_sample()? {
            Some(sample) => {
                debug!(task = ctx.task, sample, "sample acquired");
                forward(&self.output, ctx, sample)
            }
            None => {
                debug!(task = ctx.task, "no sample this period");
                Ok(())
            }
        }
    }
}

/// Receives samples and publishes the mean of every full window.
#[derive(Debug)]
pub struct AveragingJob {
    input: Arc<Handoff<Sample>>,
    output: Arc<Handoff<Sample>>,
    averager: Averager,
}

impl AveragingJob {
    /// Create a job averaging `input` into `output`.
    #[must_use]
    pub fn new(input: Arc<Handoff<Sample>>, output: Arc<Handoff<Sample>>, averager: Averager) -> Self {
        Self {
            input,
            output,
            averager,
        }
    }
}

impl Job for AveragingJob {
    fn execute(&mut self, ctx: &JobContext<'_>) -> TaskResult {
        let sample = receive(&self.input, ctx)?;
        match self.averager.push(sample) {
            Some(mean) => {
                debug!(task = ctx.task, mean, "window complete");
                forward(&self.output, ctx, mean)
            }
            None => Ok(()),
        }
    }
}

/// Receives values and hands them to a sink.
#[derive(Debug)]
pub struct OutputJob<K> {
    input: Arc<Handoff<Sample>>,
    sink: K,
}

impl<K: SampleSink> OutputJob<K> {
    /// Create a job draining `input` into `sink`.
    #[must_use]
    pub fn new(input: Arc<Handoff<Sample>>, sink: K) -> Self {
        Self { input, sink }
    }
}

impl<K: SampleSink> Job for OutputJob<K> {
    fn execute(&mut self, ctx: &JobContext<'_>) -> TaskResult {
        let value = receive(&self.input, ctx)?;
        self.sink.emit(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{CollectingSink, ScriptedSource};

    fn ctx<'a>(task: &'a str, shutdown: &'a ShutdownSignal) -> JobContext<'a> {
        JobContext {
            task,
            activation: None,
            shutdown,
            sync_timeout: Some(Duration::from_millis(20)),
            iteration: 1,
        }
    }

    #[test]
    fn test_closure_is_a_job() -> TaskResult {
        let shutdown = ShutdownSignal::new();
        let mut calls = 0;
        let mut job = |_: &JobContext<'_>| -> TaskResult {
            calls += 1;
            Ok(())
        };
        job.execute(&ctx("f", &shutdown))?;
        job.execute(&ctx("f", &shutdown))?;
        assert_eq!(calls, 2);
        Ok(())
    }

    #[test]
    fn test_counter_job_increments() -> TaskResult {
        let shutdown = ShutdownSignal::new();
        let registry = Arc::new(SequenceRegistry::new(None));
        let mut job = CounterJob::new(Arc::clone(&registry));
        job.execute(&ctx("a", &shutdown))?;
        job.execute(&ctx("a", &shutdown))?;
        assert_eq!(registry.snapshot()?.sequence, 2);
        Ok(())
    }

    #[test]
    fn test_pipeline_jobs_chain() -> TaskResult {
        let shutdown = ShutdownSignal::new();
        let raw = Arc::new(Handoff::queued("raw", 8, Some(&shutdown))?);
        let means = Arc::new(Handoff::queued("means", 2, Some(&shutdown))?);
        let sink = CollectingSink::new();

        let mut acquire =
            AcquisitionJob::new(ScriptedSource::new(vec![10, 20, 30, 40, 50]), Arc::clone(&raw));
        let mut average = AveragingJob::new(Arc::clone(&raw), Arc::clone(&means), Averager::new(5)?);
        let mut output = OutputJob::new(Arc::clone(&means), sink.clone());

        let c = ctx("t", &shutdown);
        for _ in 0..5 {
            acquire.execute(&c)?;
        }
        for _ in 0..5 {
            average.execute(&c)?;
        }
        output.execute(&c)?;
        assert_eq!(sink.values(), vec![30]);
        Ok(())
    }

    #[test]
    fn test_receive_timeout_is_recoverable() -> TaskResult {
        let shutdown = ShutdownSignal::new();
        let input = Arc::new(Handoff::latest("in", Some(&shutdown)));
        let mut job = OutputJob::new(input, CollectingSink::new());
        let err = job.execute(&ctx("out", &shutdown)).err();
        assert!(matches!(err, Some(ref e) if e.is_recoverable()));
        Ok(())
    }

    #[test]
    fn test_full_handoff_drops_value() -> TaskResult {
        let shutdown = ShutdownSignal::new();
        let raw = Arc::new(Handoff::queued("raw", 1, None)?);
        let mut acquire = AcquisitionJob::new(ScriptedSource::new(vec![1, 2]), Arc::clone(&raw));
        let c = ctx("acq", &shutdown);
        acquire.execute(&c)?;
        acquire.execute(&c)?;
        assert_eq!(raw.try_receive(), Some(1));
        assert_eq!(raw.try_receive(), None);
        Ok(())
    }

    #[test]
    fn test_shutdown_ends_blocked_receive() -> TaskResult {
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();
        let input = Arc::new(Handoff::latest("in", Some(&shutdown)));
        let mut job = OutputJob::new(input, CollectingSink::new());
        let mut c = ctx("out", &shutdown);
        c.sync_timeout = None;
        assert!(matches!(job.execute(&c), Err(ref e) if e.is_shutdown()));
        Ok(())
    }
}
