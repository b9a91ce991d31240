//! Scenario config parsing, defaults and validation.

use rtlab_scheduler::OverrunPolicy;
use rtlab_sync::HandoffMode;
use rtlab_tasks::{
    ConfigFormat, PipelineScenario, Scenario, ScenarioConfig, SharedCounterScenario, SourceConfig,
    TaskError,
};
use std::fs;

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[test]
fn test_yaml_pipeline_with_partial_fields() -> TestResult {
    let yaml = r"
scenario:
  kind: pipeline
  window: 4
  handoff:
    mode: queued
    capacity: 8
  source:
    type: scripted
    values: [1, 2, 3, 4]
runtime:
  realtime: true
  sporadic_timeout_ms: 10
duration_ms: 500
";
    let config = ScenarioConfig::parse(yaml, ConfigFormat::Yaml)?;

    let Scenario::Pipeline(pipeline) = &config.scenario else {
        return Err("expected a pipeline scenario".into());
    };
    assert_eq!(pipeline.window, 4);
    assert_eq!(pipeline.handoff, HandoffMode::Queued { capacity: 8 });
    assert_eq!(
        pipeline.source,
        SourceConfig::Scripted {
            values: vec![1, 2, 3, 4],
            cycle: false
        }
    );
    assert_eq!(pipeline.period_ms, PipelineScenario::default().period_ms);
    assert!(config.runtime.realtime);
    assert_eq!(config.runtime.warm_up, 10);
    assert_eq!(config.duration_ms, Some(500));
    Ok(())
}

#[test]
fn test_json_shared_counter() -> TestResult {
    let json = r#"{
        "scenario": {
            "kind": "shared_counter",
            "tasks": [
                { "name": "x", "priority": 80, "period_ms": 5, "load": false },
                { "name": "y", "priority": 20, "period_ms": 5, "affinity": 1 }
            ]
        },
        "runtime": { "overrun_policy": "skip_missed" }
    }"#;
    let config = ScenarioConfig::parse(json, ConfigFormat::Json)?;

    let Scenario::SharedCounter(SharedCounterScenario { tasks }) = &config.scenario else {
        return Err("expected a shared_counter scenario".into());
    };
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks.first().map(|t| t.load), Some(false));
    assert_eq!(tasks.get(1).map(|t| (t.load, t.affinity)), Some((true, Some(1))));
    assert_eq!(config.runtime.overrun_policy, OverrunPolicy::SkipMissed);
    Ok(())
}

#[test]
fn test_empty_document_is_default_jitter() -> TestResult {
    let config = ScenarioConfig::parse("{}", ConfigFormat::Json)?;
    assert_eq!(config, ScenarioConfig::default());
    assert_eq!(config.scenario.kind(), "jitter");
    Ok(())
}

#[test]
fn test_load_from_files() -> TestResult {
    let dir = tempfile::tempdir()?;

    let yaml_path = dir.path().join("jitter.yml");
    fs::write(&yaml_path, "scenario:\n  kind: jitter\nduration_ms: 100\n")?;
    assert_eq!(ScenarioConfig::load(&yaml_path)?.duration_ms, Some(100));

    let json_path = dir.path().join("pipeline.json");
    fs::write(&json_path, r#"{"scenario": {"kind": "pipeline"}}"#)?;
    assert_eq!(ScenarioConfig::load(&json_path)?.scenario.kind(), "pipeline");

    let toml_path = dir.path().join("config.toml");
    fs::write(&toml_path, "")?;
    assert!(matches!(
        ScenarioConfig::load(&toml_path),
        Err(TaskError::InvalidConfig(_))
    ));

    assert!(ScenarioConfig::load(&dir.path().join("missing.yaml")).is_err());
    Ok(())
}

#[test]
fn test_validation_errors() {
    let cases = [
        ("zero window", "scenario:\n  kind: pipeline\n  window: 0\n"),
        ("zero period", "scenario:\n  kind: pipeline\n  period_ms: 0\n"),
        ("empty tasks", "scenario:\n  kind: jitter\n  tasks: []\n"),
        (
            "zero task period",
            "scenario:\n  kind: jitter\n  tasks:\n    - {name: a, priority: 1, period_ms: 0}\n",
        ),
        ("warm-up too short", "runtime:\n  warm_up: 1\n"),
        ("zero sub-intervals", "load:\n  sub_intervals: 0\n"),
        ("zero capacity", "scenario:\n  kind: pipeline\n  handoff: {mode: queued, capacity: 0}\n"),
        ("zero duration", "duration_ms: 0\n"),
        ("unknown field", "runtime:\n  realtme: true\n"),
        ("unknown kind", "scenario:\n  kind: fancy\n"),
    ];
    for (label, yaml) in cases {
        let result = ScenarioConfig::parse(yaml, ConfigFormat::Yaml);
        assert!(
            matches!(result, Err(TaskError::InvalidConfig(_))),
            "{label}: expected InvalidConfig, got {result:?}"
        );
    }
}

#[test]
fn test_default_yaml_reloads_identically() -> TestResult {
    for scenario in [
        Scenario::default(),
        Scenario::SharedCounter(SharedCounterScenario::default()),
        Scenario::Pipeline(PipelineScenario::default()),
    ] {
        let config = ScenarioConfig::for_scenario(scenario);
        let yaml = config.to_yaml()?;
        assert_eq!(ScenarioConfig::parse(&yaml, ConfigFormat::Yaml)?, config);
    }
    Ok(())
}
