//! Acquisition → averaging → output pipeline end to end.

use rtlab_scheduler::OverrunPolicy;
use rtlab_sync::{HandoffMode, ShutdownSignal};
use rtlab_tasks::prelude::*;
use rtlab_tasks::{CollectingSink, ScriptedSource};
use std::thread;
use std::time::{Duration, Instant};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn wait_until(cond: impl Fn() -> bool) -> Result<(), &'static str> {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        if Instant::now() >= deadline {
            return Err("condition not reached within 5s");
        }
        thread::sleep(Duration::from_millis(1));
    }
    Ok(())
}

fn pipeline_config(handoff: HandoffMode) -> ScenarioConfig {
    let mut config = ScenarioConfig::for_scenario(Scenario::Pipeline(PipelineScenario {
        period_ms: 2,
        handoff,
        ..PipelineScenario::default()
    }));
    // A loaded test machine must not end the acquisition task.
    config.runtime.overrun_policy = OverrunPolicy::SkipMissed;
    config
}

fn launch(
    config: ScenarioConfig,
    source: ScriptedSource,
    sink: &CollectingSink,
    shutdown: &ShutdownSignal,
) -> TaskResult<RunningScenario> {
    ScenarioBuilder::new(config)
        .with_shutdown(shutdown)
        .with_source(source)
        .with_sink(sink.clone())
        .launch()
}

#[test]
fn test_five_samples_produce_their_mean() -> TestResult {
    let shutdown = ShutdownSignal::new();
    let sink = CollectingSink::new();
    let running = launch(
        pipeline_config(HandoffMode::Queued { capacity: 8 }),
        ScriptedSource::new(vec![10, 20, 30, 40, 50]),
        &sink,
        &shutdown,
    )?;

    wait_until(|| !sink.values().is_empty())?;
    thread::sleep(Duration::from_millis(50));
    running.shutdown();
    let outcome = running.join();

    assert_eq!(sink.values(), vec![30]);
    assert!(outcome.all_clean(), "{:?}", outcome.reports);
    let output = outcome.report("output").ok_or("missing output report")?;
    assert_eq!(output.activations, 1);
    let processing = outcome.report("processing").ok_or("missing processing report")?;
    assert_eq!(processing.activations, 5);
    Ok(())
}

#[test]
fn test_no_output_before_window_fills() -> TestResult {
    let shutdown = ShutdownSignal::new();
    let sink = CollectingSink::new();
    let running = launch(
        pipeline_config(HandoffMode::Queued { capacity: 8 }),
        ScriptedSource::new(vec![10, 20, 30, 40]),
        &sink,
        &shutdown,
    )?;

    let acquisition_running = || {
        running
            .states()
            .iter()
            .any(|(name, state)| name == "acquisition" && *state == TaskState::PeriodicRunning)
    };
    wait_until(acquisition_running)?;
    thread::sleep(Duration::from_millis(100));
    assert!(sink.values().is_empty());

    running.shutdown();
    let outcome = running.join();
    let processing = outcome.report("processing").ok_or("missing processing report")?;
    assert_eq!(processing.activations, 4);
    assert!(sink.values().is_empty());
    Ok(())
}

#[test]
fn test_one_mean_per_window() -> TestResult {
    let shutdown = ShutdownSignal::new();
    let sink = CollectingSink::new();
    let running = launch(
        pipeline_config(HandoffMode::Queued { capacity: 16 }),
        ScriptedSource::new((1..=12).collect::<Vec<_>>()),
        &sink,
        &shutdown,
    )?;

    wait_until(|| sink.values().len() >= 2)?;
    thread::sleep(Duration::from_millis(50));
    running.shutdown();
    running.join();

    // 1..=5 → 3, 6..=10 → 8, 11 and 12 stay buffered.
    assert_eq!(sink.values(), vec![3, 8]);
    Ok(())
}

#[test]
fn test_bounded_receive_timeouts_are_retried() -> TestResult {
    let shutdown = ShutdownSignal::new();
    let sink = CollectingSink::new();
    let mut config = pipeline_config(HandoffMode::Queued { capacity: 8 });
    config.runtime.sporadic_timeout_ms = Some(2);
    if let Scenario::Pipeline(pipeline) = &mut config.scenario {
        pipeline.period_ms = 10;
    }

    let running = launch(
        config,
        ScriptedSource::new(vec![10, 20, 30, 40, 50]),
        &sink,
        &shutdown,
    )?;
    wait_until(|| !sink.values().is_empty())?;
    running.shutdown();
    let outcome = running.join();

    assert_eq!(sink.values(), vec![30]);
    let output = outcome.report("output").ok_or("missing output report")?;
    assert!(output.sync_timeouts > 0);
    assert_eq!(output.exit, ExitReason::Shutdown);
    Ok(())
}

#[test]
fn test_adc_pipeline_emits_scaled_means() -> TestResult {
    let shutdown = ShutdownSignal::new();
    let sink = CollectingSink::new();
    let running = ScenarioBuilder::new(pipeline_config(HandoffMode::Latest))
        .with_shutdown(&shutdown)
        .with_sink(sink.clone())
        .launch()?;

    wait_until(|| sink.values().len() >= 3)?;
    running.shutdown();
    running.join();

    assert!(sink.values().iter().all(|v| (0..=100).contains(v)));
    Ok(())
}
