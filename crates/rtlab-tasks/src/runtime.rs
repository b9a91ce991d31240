//! Task runtime: one OS thread per task.
//!
//! Each spawned thread applies its real-time setup to itself, then runs one
//! of two loops:
//!
//! - **Periodic**: wait for the next release point, record jitter, run the
//!   load, execute the job. A missed release point ends the task under
//!   [`OverrunPolicy::Fatal`](rtlab_scheduler::OverrunPolicy::Fatal).
//! - **Sporadic**: execute the job back to back. The job is expected to block
//!   on a semaphore or handoff, which is what paces the task.
//!
//! In both loops a recoverable job error (a synchronization timeout) is
//! counted and retried, a shutdown error ends the task cleanly, and anything
//! else ends it with [`ExitReason::Failed`].

use crate::config::RuntimeConfig;
use crate::descriptor::{ActivationKind, TaskDescriptor};
use crate::error::{TaskError, TaskResult};
use crate::jobs::{Job, JobContext};
use crate::lifecycle::{TaskState, TaskStateHandle, TaskStateWriter, state_cell};
use crate::load::LoadSimulator;
use rtlab_scheduler::{
    Clock, JitterBounds, JitterTracker, PeriodicTimer, RtSetup, SchedError, Timestamp,
};
use rtlab_sync::ShutdownSignal;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Why a task loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// Shutdown was requested.
    Shutdown,
    /// A release point was missed.
    Overrun {
        /// Release points missed.
        missed: u64,
    },
    /// The job or the scheduler failed.
    Failed(String),
    /// The task thread panicked.
    Panicked,
}

impl ExitReason {
    /// Check if the task stopped because it was asked to.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        matches!(self, ExitReason::Shutdown)
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Shutdown => f.write_str("shutdown"),
            ExitReason::Overrun { missed } => write!(f, "overrun ({missed} missed)"),
            ExitReason::Failed(reason) => write!(f, "failed: {reason}"),
            ExitReason::Panicked => f.write_str("panicked"),
        }
    }
}

/// Summary of a finished task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    /// Task name.
    pub name: String,
    /// Configured priority.
    pub priority: i32,
    /// Completed releases (periodic) or successful job runs (sporadic).
    pub activations: u64,
    /// Inter-activation bounds, `None` if the warm-up never completed.
    pub jitter: Option<JitterBounds>,
    /// 99th percentile of recent inter-activation intervals.
    pub p99_ns: Option<u64>,
    /// Release points skipped under `SkipMissed`.
    pub overruns_skipped: u64,
    /// Synchronization timeouts that were retried.
    pub sync_timeouts: u64,
    /// Why the loop ended.
    pub exit: ExitReason,
}

struct SpawnedTask {
    name: String,
    priority: i32,
    state: TaskStateHandle,
    handle: JoinHandle<TaskReport>,
}

/// Owns the task threads of one experiment.
///
/// Dropping the runtime with tasks still attached triggers shutdown and
/// joins them.
pub struct TaskRuntime {
    clock: Arc<dyn Clock>,
    shutdown: ShutdownSignal,
    config: RuntimeConfig,
    tasks: Vec<SpawnedTask>,
}

impl fmt::Debug for TaskRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRuntime")
            .field("config", &self.config)
            .field("shutdown", &self.shutdown.is_triggered())
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl TaskRuntime {
    /// Create a runtime.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidConfig`] if `config` does not validate.
    pub fn new(
        clock: Arc<dyn Clock>,
        shutdown: ShutdownSignal,
        config: RuntimeConfig,
    ) -> TaskResult<Self> {
        config.validate()?;
        Ok(Self {
            clock,
            shutdown,
            config,
            tasks: Vec::new(),
        })
    }

    /// Start a task running `job`.
    ///
    /// Returns a handle to the task's live state.
    ///
    /// # Errors
    ///
    /// - [`TaskError::InvalidConfig`] for an invalid descriptor
    /// - [`TaskError::Sched`] if the period cannot be scheduled
    /// - [`TaskError::Spawn`] if the OS refuses to create the thread
    pub fn spawn<J>(&mut self, descriptor: TaskDescriptor, job: J) -> TaskResult<TaskStateHandle>
    where
        J: Job + 'static,
    {
        descriptor.validate()?;

        let timer = match descriptor.activation() {
            ActivationKind::Periodic { period } => Some(
                PeriodicTimer::with_clock(Arc::clone(&self.clock), period)?
                    .with_policy(self.config.overrun_policy)
                    .with_shutdown(&self.shutdown),
            ),
            ActivationKind::Sporadic => None,
        };
        let (writer, state) = state_cell();

        let task = TaskLoop {
            name: descriptor.name().to_owned(),
            priority: descriptor.priority(),
            setup: descriptor.rt_setup(self.config.realtime, self.config.lock_memory),
            load: descriptor.load().cloned(),
            clock: Arc::clone(&self.clock),
            shutdown: self.shutdown.clone(),
            sync_timeout: self.config.sporadic_timeout(),
            timer,
            jitter: JitterTracker::with_warm_up(self.config.warm_up)?,
            state: writer,
            activations: 0,
            calls: 0,
            overruns_skipped: 0,
            sync_timeouts: 0,
            job,
        };

        let name = descriptor.name().to_owned();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || task.run())
            .map_err(|source| TaskError::Spawn {
                name: name.clone(),
                source,
            })?;

        self.tasks.push(SpawnedTask {
            name,
            priority: descriptor.priority(),
            state: state.clone(),
            handle,
        });
        Ok(state)
    }

    /// Live state of every task, in spawn order.
    #[must_use]
    pub fn states(&self) -> Vec<(String, TaskState)> {
        self.tasks
            .iter()
            .map(|task| (task.name.clone(), task.state.get()))
            .collect()
    }

    /// Number of tasks not yet joined.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Ask every task to stop.
    pub fn shutdown(&self) {
        if self.shutdown.trigger() {
            info!(tasks = self.tasks.len(), "shutdown requested");
        }
    }

    /// Shutdown signal shared with the tasks.
    #[must_use]
    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// Runtime settings.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Wait for every task to finish and collect their reports.
    ///
    /// Blocks until each task has exited on its own; call
    /// [`TaskRuntime::shutdown`] first to stop them.
    pub fn join_all(&mut self) -> Vec<TaskReport> {
        self.tasks
            .drain(..)
            .map(|task| match task.handle.join() {
                Ok(report) => report,
                Err(_) => {
                    error!(task = %task.name, "task thread panicked");
                    TaskReport {
                        name: task.name,
                        priority: task.priority,
                        activations: 0,
                        jitter: None,
                        p99_ns: None,
                        overruns_skipped: 0,
                        sync_timeouts: 0,
                        exit: ExitReason::Panicked,
                    }
                }
            })
            .collect()
    }
}

impl Drop for TaskRuntime {
    fn drop(&mut self) {
        if !self.tasks.is_empty() {
            self.shutdown();
            self.join_all();
        }
    }
}

/// State owned by one task thread.
struct TaskLoop<J> {
    name: String,
    priority: i32,
    setup: RtSetup,
    load: Option<Arc<LoadSimulator>>,
    clock: Arc<dyn Clock>,
    shutdown: ShutdownSignal,
    sync_timeout: Option<Duration>,
    timer: Option<PeriodicTimer<Arc<dyn Clock>>>,
    jitter: JitterTracker,
    state: TaskStateWriter,
    activations: u64,
    calls: u64,
    overruns_skipped: u64,
    sync_timeouts: u64,
    job: J,
}

impl<J: Job> TaskLoop<J> {
    fn run(mut self) -> TaskReport {
        self.state.advance(TaskState::Started);
        let report = self.setup.apply_current_thread();
        report.log_degraded(&self.name);
        info!(
            task = %self.name,
            priority = self.priority,
            periodic = self.timer.is_some(),
            "task started"
        );

        let exit = match self.timer.take() {
            Some(timer) => self.run_periodic(timer),
            None => self.run_sporadic(),
        };

        self.state.advance(TaskState::Terminated);
        let bounds = self.jitter.bounds();
        info!(
            task = %self.name,
            activations = self.activations,
            min_ns = bounds.map(|b| b.min_ns),
            max_ns = bounds.map(|b| b.max_ns),
            exit = %exit,
            "task stopped"
        );

        TaskReport {
            p99_ns: self.jitter.p99_ns(),
            name: self.name,
            priority: self.priority,
            activations: self.activations,
            jitter: bounds,
            overruns_skipped: self.overruns_skipped,
            sync_timeouts: self.sync_timeouts,
            exit,
        }
    }

    fn run_periodic(&mut self, mut timer: PeriodicTimer<Arc<dyn Clock>>) -> ExitReason {
        timer.start_periodic();
        self.state.advance(TaskState::PeriodicRunning);

        let exit = loop {
            let activation = match timer.wait_next_period() {
                Ok(activation) => activation,
                Err(SchedError::Shutdown) => break ExitReason::Shutdown,
                Err(SchedError::Overrun { missed }) => {
                    error!(task = %self.name, missed, "deadline overrun, terminating task");
                    break ExitReason::Overrun { missed };
                }
                Err(e) => {
                    error!(task = %self.name, error = %e, "periodic wait failed");
                    break ExitReason::Failed(e.to_string());
                }
            };
            if activation.overruns > 0 {
                warn!(task = %self.name, skipped = activation.overruns, "release points skipped");
            }

            self.activations = timer.activations();
            self.observe(activation.woke_at);
            self.run_load();

            self.calls = self.calls.saturating_add(1);
            let ctx = JobContext {
                task: &self.name,
                activation: Some(activation),
                shutdown: &self.shutdown,
                sync_timeout: self.sync_timeout,
                iteration: self.calls,
            };
            if let Err(e) = self.job.execute(&ctx)
                && let Some(exit) = self.classify(e)
            {
                break exit;
            }
        };

        self.overruns_skipped = timer.overruns_skipped();
        exit
    }

    fn run_sporadic(&mut self) -> ExitReason {
        self.state.advance(TaskState::BlockedWaiting);

        loop {
            if self.shutdown.is_triggered() {
                return ExitReason::Shutdown;
            }

            self.calls = self.calls.saturating_add(1);
            let ctx = JobContext {
                task: &self.name,
                activation: None,
                shutdown: &self.shutdown,
                sync_timeout: self.sync_timeout,
                iteration: self.calls,
            };
            match self.job.execute(&ctx) {
                Ok(()) => {
                    self.activations = self.activations.saturating_add(1);
                    let now = self.clock.now();
                    self.observe(now);
                    self.run_load();
                }
                Err(e) => {
                    if let Some(exit) = self.classify(e) {
                        return exit;
                    }
                }
            }
        }
    }

    fn observe(&mut self, now: Timestamp) {
        let sample = self.jitter.record_activation(now);
        debug!(
            task = %self.name,
            iteration = sample.iteration,
            delta_ns = sample.delta_ns,
            "activation"
        );
        if sample.bounds_changed
            && let Some(bounds) = self.jitter.bounds()
        {
            info!(
                task = %self.name,
                min_ns = bounds.min_ns,
                max_ns = bounds.max_ns,
                "inter-arrival time bounds updated"
            );
        }
    }

    fn run_load(&self) {
        if let Some(load) = &self.load {
            load.simulate_load();
        }
    }

    /// Decide whether a job error ends the task.
    fn classify(&mut self, error: TaskError) -> Option<ExitReason> {
        if error.is_shutdown() {
            return Some(ExitReason::Shutdown);
        }
        if error.is_recoverable() {
            self.sync_timeouts = self.sync_timeouts.saturating_add(1);
            debug!(task = %self.name, error = %error, "synchronization timed out, retrying");
            return None;
        }
        if let TaskError::Sched(SchedError::Overrun { missed }) = error {
            error!(task = %self.name, missed, "deadline overrun, terminating task");
            return Some(ExitReason::Overrun { missed });
        }
        error!(task = %self.name, error = %error, "job failed, terminating task");
        Some(ExitReason::Failed(error.to_string()))
    }
}
