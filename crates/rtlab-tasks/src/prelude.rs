//! Prelude module for common task runtime types.

pub use crate::config::{
    JitterScenario, PipelineScenario, RuntimeConfig, Scenario, ScenarioConfig,
    SharedCounterScenario, TaskConfig,
};
pub use crate::descriptor::TaskDescriptor;
pub use crate::error::{TaskError, TaskResult};
pub use crate::jobs::{Job, JobContext};
pub use crate::lifecycle::TaskState;
pub use crate::load::{LoadConfig, LoadSimulator};
pub use crate::ports::{Sample, SampleSink, SampleSource};
pub use crate::runtime::{ExitReason, TaskReport, TaskRuntime};
pub use crate::scenario::{RunningScenario, ScenarioBuilder, ScenarioOutcome};
