//! Integration tests for config module public API.

use conveyor::config::{
    apply_env_overrides, find_project_root, load_settings, load_workflows, resolve_string,
    validate, validate_workflows, ExpressionContext, OutputMode, Settings, WorkflowConfig,
};
use conveyor::ConveyorError;
use std::fs;
use tempfile::TempDir;

fn write_workflow(temp: &TempDir, name: &str, content: &str) {
    let dir = temp.path().join(".conveyor").join("workflows");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(name), content).unwrap();
}

#[test]
fn public_api_is_accessible() {
    let _config = WorkflowConfig::default();
    let _ctx = ExpressionContext::new();
    let _mode = OutputMode::Verbose;
    let _settings = Settings::default();
}

#[test]
fn full_workflow_loading() {
    let temp = TempDir::new().unwrap();
    write_workflow(
        &temp,
        "ci.yml",
        r#"
on:
  pull_request:
    branches: [main]
concurrency:
  group: ${{ workflow }}-${{ event.number || event.ref }}
jobs:
  lint:
    steps:
      - run: make lint
"#,
    );
    write_workflow(
        &temp,
        "nightly.yaml",
        r#"
name: nightly-build
on: push
jobs:
  build:
    steps:
      - run: make
"#,
    );

    let workflows = load_workflows(temp.path(), None).unwrap();
    validate(&workflows).unwrap();

    let names: Vec<_> = workflows.iter().map(|w| w.name.as_str()).collect();
    assert_eq!(names, vec!["ci", "nightly-build"]);

    let group = &workflows[0].config.concurrency.as_ref().unwrap().group;
    let ctx = ExpressionContext::new()
        .with("workflow", "ci")
        .with("event.number", "42")
        .with("event.ref", "main");
    assert_eq!(resolve_string(group, &ctx).unwrap(), "ci-42");
}

#[test]
fn missing_workflows_is_config_not_found() {
    let temp = TempDir::new().unwrap();
    let err = load_workflows(temp.path(), None).unwrap_err();
    assert!(matches!(err, ConveyorError::ConfigNotFound { .. }));
}

#[test]
fn validation_collects_every_error() {
    let temp = TempDir::new().unwrap();
    write_workflow(&temp, "a.yml", "jobs:\n  x:\n    steps: []\n");

    let workflows = load_workflows(temp.path(), None).unwrap();
    let errors = validate_workflows(&workflows);

    let rules: Vec<_> = errors.iter().map(|e| e.rule.as_str()).collect();
    assert!(rules.contains(&"missing-trigger"));
    assert!(rules.contains(&"empty-job"));
    assert!(validate(&workflows).is_err());
}

#[test]
fn settings_file_and_env_overrides() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join(".conveyor");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("config.yml"),
        r#"
settings:
  max_parallel: 2
  default_output: quiet
  secret_env: [DEPLOY_KEY]
"#,
    )
    .unwrap();

    let mut settings = load_settings(temp.path()).unwrap();
    assert_eq!(settings.max_parallel, 2);
    assert_eq!(settings.default_output, OutputMode::Quiet);
    assert_eq!(settings.secret_env, vec!["DEPLOY_KEY".to_string()]);

    apply_env_overrides(&mut settings, |key| {
        (key == "CONVEYOR_MAX_PARALLEL").then(|| "8".to_string())
    })
    .unwrap();
    assert_eq!(settings.max_parallel, 8);
}

#[test]
fn project_root_found_from_subdirectory() {
    let temp = TempDir::new().unwrap();
    write_workflow(&temp, "ci.yml", "on: push\njobs: {}\n");
    let nested = temp.path().join("src").join("deep");
    fs::create_dir_all(&nested).unwrap();

    assert_eq!(find_project_root(&nested), Some(temp.path().to_path_buf()));
}
