//! rtlab - real-time task lab runner
//!
//! Launches the periodic-task, shared-counter and pipeline scenarios on OS
//! threads and reports per-task inter-arrival bounds when they stop.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod commands;
mod error;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{RunArgs, ScenarioKind};
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "rtlab")]
#[command(about = "Run periodic real-time task scenarios and report their jitter")]
#[command(version)]
#[command(long_about = "
rtlab runs fixed-priority periodic and sporadic tasks on OS threads.
Each scenario stops after --duration, on Ctrl-C, or once every task has
terminated, and then prints per-task activation counts and inter-arrival
bounds. Use --json for machine-readable output.
")]
struct Cli {
    /// Output in JSON format for machine parsing
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Periodic tasks with simulated load, reporting inter-arrival bounds
    Jitter(RunArgs),

    /// Periodic tasks incrementing one mutex-guarded counter
    SharedCounter(RunArgs),

    /// Acquisition, averaging and output tasks chained by handoffs
    Pipeline(RunArgs),

    /// Run the scenario described by a YAML or JSON file
    Run {
        /// Scenario config file (.yaml, .yml or .json)
        #[arg(short, long, env = "RTLAB_CONFIG")]
        config: PathBuf,

        #[command(flatten)]
        overrides: RunArgs,
    },

    /// Print the default config of a scenario as YAML
    ShowConfig {
        #[arg(value_enum)]
        scenario: ScenarioKind,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "rtlab={log_level},rtlab_tasks={log_level},\
                     rtlab_scheduler={log_level},rtlab_sync={log_level}"
                )
                .into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match execute_command(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }
            ExitCode::from(e.downcast_ref::<CliError>().map_or(1, CliError::exit_code))
        }
    }
}

fn execute_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Jitter(args) => commands::run_builtin(ScenarioKind::Jitter, args, cli.json),
        Commands::SharedCounter(args) => {
            commands::run_builtin(ScenarioKind::SharedCounter, args, cli.json)
        }
        Commands::Pipeline(args) => commands::run_builtin(ScenarioKind::Pipeline, args, cli.json),
        Commands::Run { config, overrides } => commands::run_file(config, overrides, cli.json),
        Commands::ShowConfig { scenario } => commands::show_config(*scenario),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn parse_jitter_defaults() -> TestResult {
        let cli = Cli::try_parse_from(["rtlab", "jitter"])?;
        assert!(!cli.json);
        assert_eq!(cli.verbose, 0);
        let Commands::Jitter(args) = cli.command else {
            return Err("expected jitter".into());
        };
        assert!(args.duration.is_none() && !args.realtime && !args.no_load);
        Ok(())
    }

    #[test]
    fn parse_global_flags_after_subcommand() -> TestResult {
        let cli = Cli::try_parse_from([
            "rtlab",
            "shared-counter",
            "-vv",
            "--json",
            "--duration",
            "250",
            "--skip-missed",
        ])?;
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        let Commands::SharedCounter(args) = cli.command else {
            return Err("expected shared-counter".into());
        };
        assert_eq!(args.duration, Some(250));
        assert!(args.skip_missed);
        Ok(())
    }

    #[test]
    fn parse_run_with_overrides() -> TestResult {
        let cli = Cli::try_parse_from(["rtlab", "run", "--config", "lab.yaml", "--period", "5"])?;
        let Commands::Run { config, overrides } = cli.command else {
            return Err("expected run".into());
        };
        assert_eq!(config, PathBuf::from("lab.yaml"));
        assert_eq!(overrides.period, Some(5));
        Ok(())
    }

    #[test]
    fn parse_show_config_kinds() -> TestResult {
        let cli = Cli::try_parse_from(["rtlab", "show-config", "shared-counter"])?;
        assert!(matches!(
            cli.command,
            Commands::ShowConfig {
                scenario: ScenarioKind::SharedCounter
            }
        ));
        assert!(Cli::try_parse_from(["rtlab", "show-config", "unknown"]).is_err());
        Ok(())
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
