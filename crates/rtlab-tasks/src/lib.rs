//! Task runtime, jobs and scenarios for periodic real-time experiments.
//!
//! This crate ties the scheduler and synchronization crates together into
//! running tasks:
//!
//! - **TaskRuntime**: one named OS thread per task, real-time setup applied
//!   by the thread itself, periodic or sporadic loop, per-task reports
//! - **Jobs**: idle load tasks, a shared sequence counter, and an
//!   acquisition → averaging → output pipeline over handoffs
//! - **LoadSimulator**: deterministic CPU load by numeric integration
//! - **Scenarios**: serde-configurable experiments (`jitter`,
//!   `shared_counter`, `pipeline`) loaded from YAML or JSON
//!
//! # Failure model
//!
//! | Failure                         | Effect                              |
//! |---------------------------------|-------------------------------------|
//! | Invalid config / spawn failure  | Startup aborted with [`TaskError`]  |
//! | Missed release point            | That task ends with `Overrun`       |
//! | Synchronization timeout         | Counted and retried                 |
//! | Priority / affinity not applied | Warning, task keeps running         |
//!
//! # Example
//!
//! ```no_run
//! use rtlab_tasks::prelude::*;
//! use std::time::Duration;
//!
//! let config = ScenarioConfig::for_scenario(Scenario::Pipeline(PipelineScenario::default()));
//! let running = ScenarioBuilder::new(config).launch()?;
//! let outcome = running.run_for(Some(Duration::from_secs(2)));
//! for report in &outcome.reports {
//!     println!("{}: {} activations, {}", report.name, report.activations, report.exit);
//! }
//! # Ok::<(), TaskError>(())
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]
#![deny(static_mut_refs)]
#![deny(unused_must_use)]

pub mod config;
pub mod descriptor;
pub mod error;
pub mod jobs;
pub mod lifecycle;
pub mod load;
pub mod pipeline;
pub mod ports;
pub mod registry;
pub mod runtime;
pub mod scenario;

pub mod prelude;

pub use config::{
    ConfigFormat, JitterScenario, PipelineScenario, RuntimeConfig, Scenario, ScenarioConfig,
    SharedCounterScenario, SourceConfig, TaskConfig,
};
pub use descriptor::{ActivationKind, TaskDescriptor};
pub use error::{TaskError, TaskResult};
pub use jobs::{AcquisitionJob, AveragingJob, CounterJob, IdleJob, Job, JobContext, OutputJob};
pub use lifecycle::{TaskState, TaskStateHandle};
pub use load::{Calibration, Integration, LoadConfig, LoadSimulator};
pub use pipeline::Averager;
pub use ports::{CollectingSink, LogSink, Sample, SampleSink, SampleSource, ScriptedSource, SimulatedAdc};
pub use registry::{RegistrySnapshot, SequenceRegistry};
pub use runtime::{ExitReason, TaskReport, TaskRuntime};
pub use scenario::{RunningScenario, ScenarioBuilder, ScenarioOutcome};
