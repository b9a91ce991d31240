//! Output formatting for scenario results

use anyhow::{Error, Result};
use colored::*;
use rtlab_tasks::{ExitReason, ScenarioOutcome, TaskReport};
use serde_json::{Value, json};
use std::time::Duration;

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let error_json = json!({
        "success": false,
        "error": {
            "message": error.to_string(),
            "chain": error.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>(),
        }
    });
    match serde_json::to_string_pretty(&error_json) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format error as JSON: {e}"),
    }
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    let mut source = error.source();
    while let Some(err) = source {
        eprintln!("  {} {}", "Caused by:".yellow(), err);
        source = err.source();
    }
}

/// Print the results of a finished scenario.
pub fn print_outcome(outcome: &ScenarioOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome_json(outcome))?);
        return Ok(());
    }

    println!("{} {}", "Scenario:".bold(), outcome.kind);
    println!(
        "  {:<12} {:>5} {:>11} {:>12} {:>12} {:>12} {:>8} {:>9}  {}",
        "TASK", "PRIO", "ACTIVATIONS", "MIN", "MAX", "P99", "SKIPPED", "TIMEOUTS", "EXIT"
    );
    for report in &outcome.reports {
        print_report_human(report);
    }

    if let Some(counter) = &outcome.counter {
        println!("{} {}", "Shared counter:".bold(), counter.sequence);
        for (writer, count) in &counter.per_writer {
            println!("  {writer:<12} {count}");
        }
    }
    if let Some(calibration) = &outcome.calibration {
        println!(
            "{} integral {:.4} in {:?}",
            "Load:".bold(),
            calibration.value,
            calibration.elapsed
        );
    }
    Ok(())
}

fn print_report_human(report: &TaskReport) {
    let (min, max) = match report.jitter {
        Some(bounds) => (millis(bounds.min_ns), millis(bounds.max_ns)),
        None => ("-".to_string(), "-".to_string()),
    };
    let p99 = report.p99_ns.map_or_else(|| "-".to_string(), millis);
    let exit = match report.exit {
        ExitReason::Shutdown => report.exit.to_string().green(),
        ExitReason::Overrun { .. } => report.exit.to_string().yellow(),
        ExitReason::Failed(_) | ExitReason::Panicked => report.exit.to_string().red(),
    };
    println!(
        "  {:<12} {:>5} {:>11} {:>12} {:>12} {:>12} {:>8} {:>9}  {}",
        report.name,
        report.priority,
        report.activations,
        min,
        max,
        p99,
        report.overruns_skipped,
        report.sync_timeouts,
        exit
    );
}

fn millis(ns: u64) -> String {
    format!("{:?}", Duration::from_nanos(ns))
}

fn outcome_json(outcome: &ScenarioOutcome) -> Value {
    let tasks: Vec<Value> = outcome
        .reports
        .iter()
        .map(|report| {
            json!({
                "name": report.name,
                "priority": report.priority,
                "activations": report.activations,
                "jitter": report.jitter.map(|bounds| json!({
                    "min_ns": bounds.min_ns,
                    "max_ns": bounds.max_ns,
                    "spread_ns": bounds.spread_ns(),
                })),
                "p99_ns": report.p99_ns,
                "overruns_skipped": report.overruns_skipped,
                "sync_timeouts": report.sync_timeouts,
                "exit": report.exit.to_string(),
                "clean": report.exit.is_clean(),
            })
        })
        .collect();

    json!({
        "success": true,
        "scenario": outcome.kind,
        "tasks": tasks,
        "counter": outcome.counter.as_ref().map(|counter| json!({
            "sequence": counter.sequence,
            "last_writer": counter.last_writer,
            "per_writer": counter.per_writer,
        })),
        "calibration": outcome.calibration.map(|calibration| json!({
            "elapsed_ns": u64::try_from(calibration.elapsed.as_nanos()).unwrap_or(u64::MAX),
            "value": calibration.value,
        })),
    })
}
