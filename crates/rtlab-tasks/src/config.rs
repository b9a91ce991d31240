//! Scenario configuration.
//!
//! Every type deserializes with defaults for missing fields, so a config file
//! only needs the values it changes:
//!
//! ```yaml
//! scenario:
//!   kind: pipeline
//!   window: 5
//!   handoff:
//!     mode: queued
//!     capacity: 8
//! runtime:
//!   realtime: true
//! duration_ms: 5000
//! ```

use crate::error::{TaskError, TaskResult};
use crate::load::LoadConfig;
use crate::pipeline::DEFAULT_WINDOW;
use rtlab_scheduler::OverrunPolicy;
use rtlab_scheduler::jitter::DEFAULT_WARM_UP;
use rtlab_sync::HandoffMode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Settings shared by every task of a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Request `SCHED_FIFO` with each task's priority.
    pub realtime: bool,
    /// Lock process memory at task start.
    pub lock_memory: bool,
    /// Jitter warm-up window (activations).
    pub warm_up: u32,
    /// What a periodic task does when it misses a release point.
    pub overrun_policy: OverrunPolicy,
    /// Bound on blocking receives in sporadic tasks; absent blocks until
    /// data or shutdown.
    pub sporadic_timeout_ms: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            realtime: false,
            lock_memory: false,
            warm_up: DEFAULT_WARM_UP,
            overrun_policy: OverrunPolicy::default(),
            sporadic_timeout_ms: None,
        }
    }
}

impl RuntimeConfig {
    /// Validate the settings.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidConfig`] for a warm-up below 2 or a zero
    /// sporadic timeout.
    pub fn validate(&self) -> TaskResult {
        if self.warm_up < 2 {
            return Err(TaskError::invalid_config("warm_up must be at least 2"));
        }
        if self.sporadic_timeout_ms == Some(0) {
            return Err(TaskError::invalid_config(
                "sporadic_timeout_ms must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Sporadic receive timeout.
    #[must_use]
    pub fn sporadic_timeout(&self) -> Option<Duration> {
        self.sporadic_timeout_ms.map(Duration::from_millis)
    }
}

/// One periodic task of a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Task name.
    pub name: String,
    /// Priority (higher = more urgent).
    pub priority: i32,
    /// Activation period in milliseconds.
    pub period_ms: u64,
    /// Core to pin the task to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<usize>,
    /// Run the load simulator after each activation.
    #[serde(default = "default_true")]
    pub load: bool,
}

fn default_true() -> bool {
    true
}

impl TaskConfig {
    /// Create a loaded task entry.
    #[must_use]
    pub fn new(name: impl Into<String>, priority: i32, period_ms: u64) -> Self {
        Self {
            name: name.into(),
            priority,
            period_ms,
            affinity: None,
            load: true,
        }
    }

    /// Pin to `core`.
    #[must_use]
    pub fn pinned(mut self, core: usize) -> Self {
        self.affinity = Some(core);
        self
    }

    /// Activation period.
    #[must_use]
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    fn validate(&self) -> TaskResult {
        if self.name.is_empty() {
            return Err(TaskError::invalid_config("task name must not be empty"));
        }
        if self.period_ms == 0 {
            return Err(TaskError::InvalidConfig(format!(
                "task '{}' has a zero period",
                self.name
            )));
        }
        Ok(())
    }
}

fn validate_tasks(tasks: &[TaskConfig]) -> TaskResult {
    if tasks.is_empty() {
        return Err(TaskError::invalid_config("scenario has no tasks"));
    }
    for (i, task) in tasks.iter().enumerate() {
        task.validate()?;
        if tasks.iter().skip(i + 1).any(|other| other.name == task.name) {
            return Err(TaskError::InvalidConfig(format!(
                "duplicate task name '{}'",
                task.name
            )));
        }
    }
    Ok(())
}

/// Periodic tasks that only burn load; their jitter is the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JitterScenario {
    /// Tasks to run.
    pub tasks: Vec<TaskConfig>,
}

impl Default for JitterScenario {
    fn default() -> Self {
        Self {
            tasks: vec![
                TaskConfig::new("a", 25, 100),
                TaskConfig::new("b", 10, 100).pinned(0),
                TaskConfig::new("c", 50, 100).pinned(0),
            ],
        }
    }
}

/// Periodic tasks incrementing one shared sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SharedCounterScenario {
    /// Tasks to run.
    pub tasks: Vec<TaskConfig>,
}

impl Default for SharedCounterScenario {
    fn default() -> Self {
        Self {
            tasks: vec![
                TaskConfig::new("a", 25, 1_000),
                TaskConfig::new("b", 10, 1_000).pinned(0),
                TaskConfig::new("c", 75, 1_000).pinned(0),
            ],
        }
    }
}

/// Where the acquisition task reads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Simulated 10-bit converter ramp.
    Adc {
        /// First raw reading.
        #[serde(default)]
        start: u16,
        /// Raw increment per reading.
        #[serde(default = "default_adc_step")]
        step: u16,
    },
    /// Fixed samples.
    Scripted {
        /// Samples to replay.
        values: Vec<i32>,
        /// Start over after the last sample.
        #[serde(default)]
        cycle: bool,
    },
}

fn default_adc_step() -> u16 {
    31
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::Adc {
            start: 0,
            step: default_adc_step(),
        }
    }
}

/// Acquisition → averaging → output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineScenario {
    /// Acquisition period in milliseconds.
    pub period_ms: u64,
    /// Acquisition task priority.
    pub acquisition_priority: i32,
    /// Averaging task priority.
    pub averaging_priority: i32,
    /// Output task priority.
    pub output_priority: i32,
    /// Samples per mean.
    pub window: u32,
    /// Link between stages.
    pub handoff: HandoffMode,
    /// Sample source.
    pub source: SourceConfig,
}

impl Default for PipelineScenario {
    fn default() -> Self {
        Self {
            period_ms: 100,
            acquisition_priority: 3,
            averaging_priority: 2,
            output_priority: 1,
            window: DEFAULT_WINDOW,
            handoff: HandoffMode::default(),
            source: SourceConfig::default(),
        }
    }
}

impl PipelineScenario {
    fn validate(&self) -> TaskResult {
        if self.period_ms == 0 {
            return Err(TaskError::invalid_config("pipeline period_ms must be greater than 0"));
        }
        if self.window == 0 {
            return Err(TaskError::invalid_config("pipeline window must be greater than 0"));
        }
        if self.handoff == (HandoffMode::Queued { capacity: 0 }) {
            return Err(TaskError::invalid_config(
                "queued handoff capacity must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Acquisition period.
    #[must_use]
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// The experiment to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scenario {
    /// See [`JitterScenario`].
    Jitter(JitterScenario),
    /// See [`SharedCounterScenario`].
    SharedCounter(SharedCounterScenario),
    /// See [`PipelineScenario`].
    Pipeline(PipelineScenario),
}

impl Default for Scenario {
    fn default() -> Self {
        Self::Jitter(JitterScenario::default())
    }
}

impl Scenario {
    /// Scenario kind as used on the command line.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Scenario::Jitter(_) => "jitter",
            Scenario::SharedCounter(_) => "shared_counter",
            Scenario::Pipeline(_) => "pipeline",
        }
    }

    /// Validate the scenario.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> TaskResult {
        match self {
            Scenario::Jitter(s) => validate_tasks(&s.tasks),
            Scenario::SharedCounter(s) => validate_tasks(&s.tasks),
            Scenario::Pipeline(s) => s.validate(),
        }
    }
}

/// Complete configuration of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    /// The experiment.
    pub scenario: Scenario,
    /// Runtime settings.
    pub runtime: RuntimeConfig,
    /// Load simulator parameters.
    pub load: LoadConfig,
    /// Run time in milliseconds; absent runs until interrupted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// On-disk format of a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.yaml` / `.yml`
    Yaml,
    /// `.json`
    Json,
}

impl ConfigFormat {
    /// Pick the format from a file extension.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidConfig`] for an unknown extension.
    pub fn from_path(path: &Path) -> TaskResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            _ => Err(TaskError::InvalidConfig(format!(
                "unsupported config file extension: {}",
                path.display()
            ))),
        }
    }
}

impl ScenarioConfig {
    /// Create a config running `scenario` with default settings.
    #[must_use]
    pub fn for_scenario(scenario: Scenario) -> Self {
        Self {
            scenario,
            ..Self::default()
        }
    }

    /// Parse and validate a config.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidConfig`] on a parse or validation error.
    pub fn parse(text: &str, format: ConfigFormat) -> TaskResult<Self> {
        let config: Self = match format {
            ConfigFormat::Yaml => serde_yaml::from_str(text)
                .map_err(|e| TaskError::InvalidConfig(format!("invalid YAML: {e}")))?,
            ConfigFormat::Json => serde_json::from_str(text)
                .map_err(|e| TaskError::InvalidConfig(format!("invalid JSON: {e}")))?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file; the format follows the extension.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidConfig`] if the file cannot be read,
    /// parsed or validated.
    pub fn load(path: &Path) -> TaskResult<Self> {
        let format = ConfigFormat::from_path(path)?;
        let text = std::fs::read_to_string(path).map_err(|e| {
            TaskError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&text, format)
    }

    /// Render as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidConfig`] if serialization fails.
    pub fn to_yaml(&self) -> TaskResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| TaskError::InvalidConfig(format!("cannot render YAML: {e}")))
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> TaskResult {
        self.scenario.validate()?;
        self.runtime.validate()?;
        self.load.validate()?;
        if self.duration_ms == Some(0) {
            return Err(TaskError::invalid_config("duration_ms must be greater than 0"));
        }
        Ok(())
    }

    /// Run time.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        self.duration_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() -> TaskResult {
        ScenarioConfig::default().validate()?;
        ScenarioConfig::for_scenario(Scenario::SharedCounter(SharedCounterScenario::default()))
            .validate()?;
        ScenarioConfig::for_scenario(Scenario::Pipeline(PipelineScenario::default())).validate()?;
        Ok(())
    }

    #[test]
    fn test_jitter_defaults() {
        let scenario = JitterScenario::default();
        let priorities: Vec<_> = scenario.tasks.iter().map(|t| t.priority).collect();
        assert_eq!(priorities, vec![25, 10, 50]);
        assert!(scenario.tasks.iter().all(|t| t.period_ms == 100));
        assert_eq!(
            scenario.tasks.iter().filter(|t| t.affinity == Some(0)).count(),
            2
        );
    }

    #[test]
    fn test_empty_task_list_rejected() {
        let config = ScenarioConfig::for_scenario(Scenario::Jitter(JitterScenario { tasks: vec![] }));
        assert!(matches!(config.validate(), Err(TaskError::InvalidConfig(_))));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let config = ScenarioConfig::for_scenario(Scenario::Jitter(JitterScenario {
            tasks: vec![TaskConfig::new("a", 1, 10), TaskConfig::new("a", 2, 10)],
        }));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_runtime_validation() {
        let runtime = RuntimeConfig {
            warm_up: 1,
            ..RuntimeConfig::default()
        };
        assert!(runtime.validate().is_err());

        let runtime = RuntimeConfig {
            sporadic_timeout_ms: Some(0),
            ..RuntimeConfig::default()
        };
        assert!(runtime.validate().is_err());
    }

    #[test]
    fn test_format_from_path() -> TaskResult {
        assert_eq!(ConfigFormat::from_path(Path::new("a.yml"))?, ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.yaml"))?, ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.json"))?, ConfigFormat::Json);
        assert!(ConfigFormat::from_path(Path::new("a.toml")).is_err());
        Ok(())
    }
}
