//! Ready-made experiments built from a [`ScenarioConfig`].

use crate::config::{PipelineScenario, Scenario, ScenarioConfig, SourceConfig, TaskConfig};
use crate::descriptor::TaskDescriptor;
use crate::error::TaskResult;
use crate::jobs::{AcquisitionJob, AveragingJob, CounterJob, IdleJob, Job, OutputJob};
use crate::lifecycle::TaskState;
use crate::load::{Calibration, LoadSimulator};
use crate::pipeline::Averager;
use crate::ports::{LogSink, SampleSink, SampleSource, ScriptedSource, SimulatedAdc};
use crate::registry::{RegistrySnapshot, SequenceRegistry};
use crate::runtime::{TaskReport, TaskRuntime};
use rtlab_scheduler::{Clock, MonotonicClock};
use rtlab_sync::{Handoff, ShutdownSignal};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// How often an unattended run checks whether any task is still alive.
const LIVENESS_POLL: Duration = Duration::from_millis(100);

/// Builds and launches the tasks of one scenario.
pub struct ScenarioBuilder {
    config: ScenarioConfig,
    clock: Arc<dyn Clock>,
    shutdown: ShutdownSignal,
    source: Option<Box<dyn SampleSource>>,
    sink: Option<Box<dyn SampleSink>>,
}

impl fmt::Debug for ScenarioBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenarioBuilder")
            .field("config", &self.config)
            .field("custom_source", &self.source.is_some())
            .field("custom_sink", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

impl ScenarioBuilder {
    /// Start from `config` with the monotonic clock and a fresh shutdown
    /// signal.
    #[must_use]
    pub fn new(config: ScenarioConfig) -> Self {
        Self {
            config,
            clock: Arc::new(MonotonicClock::new()),
            shutdown: ShutdownSignal::new(),
            source: None,
            sink: None,
        }
    }

    /// Use `clock` for every task.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Stop the tasks when `signal` fires.
    #[must_use]
    pub fn with_shutdown(mut self, signal: &ShutdownSignal) -> Self {
        self.shutdown = signal.clone();
        self
    }

    /// Replace the configured pipeline source.
    #[must_use]
    pub fn with_source(mut self, source: impl SampleSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Replace the pipeline's logging sink.
    #[must_use]
    pub fn with_sink(mut self, sink: impl SampleSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Validate the config and start every task.
    ///
    /// If a task fails to start, the ones already running are stopped and
    /// joined before the error is returned.
    ///
    /// # Errors
    ///
    /// Any validation or spawn error.
    pub fn launch(self) -> TaskResult<RunningScenario> {
        self.config.validate()?;
        let load = Arc::new(LoadSimulator::new(self.config.load)?);
        let mut runtime = TaskRuntime::new(
            Arc::clone(&self.clock),
            self.shutdown.clone(),
            self.config.runtime,
        )?;
        let kind = self.config.scenario.kind();
        let mut registry = None;

        let started = match &self.config.scenario {
            Scenario::Jitter(s) => spawn_periodic(&mut runtime, &s.tasks, &load, |_| IdleJob),
            Scenario::SharedCounter(s) => {
                let shared = Arc::new(SequenceRegistry::new(Some(&self.shutdown)));
                registry = Some(Arc::clone(&shared));
                spawn_periodic(&mut runtime, &s.tasks, &load, |_| {
                    CounterJob::new(Arc::clone(&shared))
                })
            }
            Scenario::Pipeline(s) => {
                let source = match self.source {
                    Some(source) => source,
                    None => source_from_config(&s.source),
                };
                let sink = match self.sink {
                    Some(sink) => sink,
                    None => Box::new(LogSink),
                };
                spawn_pipeline(&mut runtime, s, &self.shutdown, source, sink)
            }
        };

        if let Err(e) = started {
            error!(scenario = kind, error = %e, "scenario failed to start");
            runtime.shutdown();
            runtime.join_all();
            return Err(e);
        }

        info!(scenario = kind, tasks = runtime.task_count(), "scenario started");
        Ok(RunningScenario {
            kind,
            runtime,
            registry,
            load,
        })
    }
}

fn spawn_periodic<J, F>(
    runtime: &mut TaskRuntime,
    tasks: &[TaskConfig],
    load: &Arc<LoadSimulator>,
    mut make_job: F,
) -> TaskResult
where
    J: Job + 'static,
    F: FnMut(&TaskConfig) -> J,
{
    for task in tasks {
        let mut descriptor =
            TaskDescriptor::periodic(task.name.as_str(), task.period()).with_priority(task.priority);
        if let Some(core) = task.affinity {
            descriptor = descriptor.with_affinity(core);
        }
        if task.load {
            descriptor = descriptor.with_load(Arc::clone(load));
        }
        runtime.spawn(descriptor, make_job(task))?;
    }
    Ok(())
}

fn source_from_config(config: &SourceConfig) -> Box<dyn SampleSource> {
    match config {
        SourceConfig::Adc { start, step } => Box::new(SimulatedAdc::new(*start, *step)),
        SourceConfig::Scripted {
            values,
            cycle: true,
        } => Box::new(ScriptedSource::cycling(values.clone())),
        SourceConfig::Scripted {
            values,
            cycle: false,
        } => Box::new(ScriptedSource::new(values.clone())),
    }
}

fn spawn_pipeline(
    runtime: &mut TaskRuntime,
    config: &PipelineScenario,
    shutdown: &ShutdownSignal,
    source: Box<dyn SampleSource>,
    sink: Box<dyn SampleSink>,
) -> TaskResult {
    let samples = Arc::new(Handoff::new("samples", config.handoff, Some(shutdown))?);
    let means = Arc::new(Handoff::new("means", config.handoff, Some(shutdown))?);

    // Consumers first, so they are already waiting when the first sample lands.
    runtime.spawn(
        TaskDescriptor::sporadic("output").with_priority(config.output_priority),
        OutputJob::new(Arc::clone(&means), sink),
    )?;
    runtime.spawn(
        TaskDescriptor::sporadic("processing").with_priority(config.averaging_priority),
        AveragingJob::new(Arc::clone(&samples), means, Averager::new(config.window)?),
    )?;
    runtime.spawn(
        TaskDescriptor::periodic("acquisition", config.period())
            .with_priority(config.acquisition_priority),
        AcquisitionJob::new(source, samples),
    )?;
    Ok(())
}

/// A launched scenario.
#[derive(Debug)]
pub struct RunningScenario {
    kind: &'static str,
    runtime: TaskRuntime,
    registry: Option<Arc<SequenceRegistry>>,
    load: Arc<LoadSimulator>,
}

impl RunningScenario {
    /// Scenario kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Live state of every task.
    #[must_use]
    pub fn states(&self) -> Vec<(String, TaskState)> {
        self.runtime.states()
    }

    /// Shared counter of a `shared_counter` scenario.
    #[must_use]
    pub fn registry(&self) -> Option<&Arc<SequenceRegistry>> {
        self.registry.as_ref()
    }

    /// Shutdown signal the tasks observe.
    #[must_use]
    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        self.runtime.shutdown_signal()
    }

    /// Ask every task to stop.
    pub fn shutdown(&self) {
        self.runtime.shutdown();
    }

    /// Run until `duration` elapses, shutdown fires or every task has
    /// terminated on its own, then stop and join.
    ///
    /// With no duration, runs until shutdown fires or all tasks are gone.
    pub fn run_for(self, duration: Option<Duration>) -> ScenarioOutcome {
        let deadline = duration.and_then(|d| Instant::now().checked_add(d));
        loop {
            let slice = match deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        info!(scenario = self.kind, ?duration, "run time elapsed");
                        break;
                    }
                    left.min(LIVENESS_POLL)
                }
                None => LIVENESS_POLL,
            };
            if self.runtime.shutdown_signal().wait_timeout(slice) {
                break;
            }
            if self.all_terminated() {
                warn!(scenario = self.kind, "every task has terminated");
                break;
            }
        }
        self.shutdown();
        self.join()
    }

    fn all_terminated(&self) -> bool {
        self.runtime
            .states()
            .iter()
            .all(|(_, state)| state.is_terminal())
    }

    /// Wait for every task to exit and collect the results.
    pub fn join(mut self) -> ScenarioOutcome {
        let reports = self.runtime.join_all();
        let counter = match &self.registry {
            Some(registry) => registry.snapshot().ok(),
            None => None,
        };
        ScenarioOutcome {
            kind: self.kind,
            reports,
            counter,
            calibration: self.load.calibration(),
        }
    }
}

/// Results of a finished scenario.
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    /// Scenario kind.
    pub kind: &'static str,
    /// One report per task, in spawn order.
    pub reports: Vec<TaskReport>,
    /// Final shared counter (`shared_counter` only).
    pub counter: Option<RegistrySnapshot>,
    /// Load timing of the first loaded activation.
    pub calibration: Option<Calibration>,
}

impl ScenarioOutcome {
    /// Check if every task stopped because of shutdown.
    #[must_use]
    pub fn all_clean(&self) -> bool {
        self.reports.iter().all(|report| report.exit.is_clean())
    }

    /// Report of the task called `name`.
    #[must_use]
    pub fn report(&self, name: &str) -> Option<&TaskReport> {
        self.reports.iter().find(|report| report.name == name)
    }
}
