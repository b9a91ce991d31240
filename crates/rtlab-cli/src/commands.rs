//! Scenario commands

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use rtlab_scheduler::OverrunPolicy;
use rtlab_sync::ShutdownSignal;
use rtlab_tasks::{
    ExitReason, JitterScenario, PipelineScenario, Scenario, ScenarioBuilder, ScenarioConfig,
    SharedCounterScenario,
};
use std::path::Path;
use tracing::info;

use crate::error::CliError;
use crate::output;

/// Scenario selector for `show-config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScenarioKind {
    Jitter,
    SharedCounter,
    Pipeline,
}

impl ScenarioKind {
    pub fn default_config(self) -> ScenarioConfig {
        let scenario = match self {
            ScenarioKind::Jitter => Scenario::Jitter(JitterScenario::default()),
            ScenarioKind::SharedCounter => {
                Scenario::SharedCounter(SharedCounterScenario::default())
            }
            ScenarioKind::Pipeline => Scenario::Pipeline(PipelineScenario::default()),
        };
        ScenarioConfig::for_scenario(scenario)
    }
}

/// Flags that override a scenario config.
#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// Stop after this many milliseconds (default: until Ctrl-C or every task stops)
    #[arg(short, long, value_name = "MS", env = "RTLAB_DURATION_MS")]
    pub duration: Option<u64>,

    /// Release period of every periodic task
    #[arg(long, value_name = "MS")]
    pub period: Option<u64>,

    /// Request SCHED_FIFO priorities and locked memory
    #[arg(long)]
    pub realtime: bool,

    /// Skip missed release points instead of stopping the late task
    #[arg(long)]
    pub skip_missed: bool,

    /// Disable the simulated load
    #[arg(long)]
    pub no_load: bool,
}

impl RunArgs {
    /// Apply the flags to `config` and re-validate it.
    pub fn apply(&self, config: &mut ScenarioConfig) -> Result<(), CliError> {
        if let Some(duration) = self.duration {
            config.duration_ms = Some(duration);
        }
        if self.realtime {
            config.runtime.realtime = true;
            config.runtime.lock_memory = true;
        }
        if self.skip_missed {
            config.runtime.overrun_policy = OverrunPolicy::SkipMissed;
        }
        match &mut config.scenario {
            Scenario::Jitter(JitterScenario { tasks })
            | Scenario::SharedCounter(SharedCounterScenario { tasks }) => {
                for task in tasks {
                    if let Some(period) = self.period {
                        task.period_ms = period;
                    }
                    if self.no_load {
                        task.load = false;
                    }
                }
            }
            Scenario::Pipeline(pipeline) => {
                if let Some(period) = self.period {
                    pipeline.period_ms = period;
                }
            }
        }
        config.validate()?;
        Ok(())
    }
}

/// Run the default config of `kind` with `overrides` applied.
pub fn run_builtin(kind: ScenarioKind, overrides: &RunArgs, json: bool) -> Result<()> {
    let mut config = kind.default_config();
    overrides.apply(&mut config)?;
    run_scenario(config, json)
}

/// Run the scenario described by the file at `path`.
pub fn run_file(path: &Path, overrides: &RunArgs, json: bool) -> Result<()> {
    let mut config = ScenarioConfig::load(path)
        .map_err(CliError::from)
        .with_context(|| format!("failed to load {}", path.display()))?;
    overrides.apply(&mut config)?;
    run_scenario(config, json)
}

/// Print the default config of `kind` as YAML.
pub fn show_config(kind: ScenarioKind) -> Result<()> {
    let yaml = kind
        .default_config()
        .to_yaml()
        .map_err(|e| CliError::Render(e.to_string()))?;
    print!("{yaml}");
    Ok(())
}

fn run_scenario(config: ScenarioConfig, json: bool) -> Result<()> {
    let shutdown = ShutdownSignal::new();
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            if shutdown.trigger() {
                info!("interrupt received, stopping tasks");
            }
        })
        .context("failed to install Ctrl-C handler")?;
    }

    let duration = config.duration();
    let kind = config.scenario.kind();
    let running = ScenarioBuilder::new(config)
        .with_shutdown(&shutdown)
        .launch()
        .map_err(CliError::from)
        .with_context(|| format!("failed to start the {kind} scenario"))?;
    info!(scenario = kind, ?duration, "scenario running");

    let outcome = running.run_for(duration);
    output::print_outcome(&outcome, json)?;

    let failed = outcome
        .reports
        .iter()
        .filter(|report| matches!(report.exit, ExitReason::Failed(_) | ExitReason::Panicked))
        .count();
    if failed > 0 {
        return Err(CliError::TaskFailure(failed).into());
    }
    Ok(())
}
