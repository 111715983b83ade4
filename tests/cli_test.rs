//! Integration tests for the conveyor binary.
// The cargo_bin function is marked deprecated in favor of cargo_bin! macro,
// but both work correctly. Suppressing until assert_cmd stabilizes the new API.
#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn setup_project(workflows: &[(&str, &str)]) -> TempDir {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join(".conveyor").join("workflows");
    fs::create_dir_all(&dir).unwrap();
    for (name, content) in workflows {
        fs::write(dir.join(name), content).unwrap();
    }
    temp
}

fn conveyor(temp: &TempDir) -> Command {
    let mut cmd = Command::new(cargo_bin("conveyor"));
    cmd.current_dir(temp.path())
        .env("CI", "1")
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

const BUILD: &str = r#"
name: build
on:
  push:
  pull_request:
jobs:
  build:
    strategy:
      matrix:
        os: [linux, mac]
    steps:
      - name: compile
        run: echo "building on $MATRIX_OS"
"#;

const LINT: &str = r#"
name: lint
on: [push]
jobs:
  lint:
    steps:
      - name: lint
        run: exit 3
      - name: report
        if: failure()
        run: echo "lint failed"
"#;

const PR_ONLY: &str = r#"
name: review
on: pull_request
concurrency:
  group: review-${{ event.number }}
jobs:
  check:
    steps:
      - run: echo "reviewing $CONVEYOR_JOB"
"#;

#[test]
fn cli_shows_help() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("conveyor"));
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("CI run coordinator"));
    Ok(())
}

#[test]
fn cli_shows_version() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("conveyor"));
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn cli_no_args_runs_push_on_main() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(&[("build.yml", BUILD)]);
    conveyor(&temp)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 runs: 2 succeeded, 0 failed, 0 cancelled"));
    Ok(())
}

#[test]
fn cli_failing_run_exits_one() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(&[("build.yml", BUILD), ("lint.yml", LINT)]);
    conveyor(&temp)
        .arg("run")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("lint: exited with code 3"))
        .stdout(predicate::str::contains("1 failed"));
    Ok(())
}

#[test]
fn cli_missing_workflows_exits_two() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    conveyor(&temp)
        .args(["run", "--project"])
        .arg(temp.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No workflows found"));
    Ok(())
}

#[test]
fn cli_unknown_workflow_exits_two() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(&[("build.yml", BUILD)]);
    conveyor(&temp)
        .args(["run", "--workflow", "deploy"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Unknown workflow: deploy"));
    Ok(())
}

#[test]
fn cli_invalid_workflow_exits_two_on_run() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(&[("broken.yml", "on: push\njobs:\n  a:\n    steps: []\n")]);
    conveyor(&temp).arg("run").assert().code(2);
    Ok(())
}

#[test]
fn cli_pull_request_needs_number() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(&[("review.yml", PR_ONLY)]);
    conveyor(&temp)
        .args(["run", "--event", "pull_request"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--pr"));
    Ok(())
}

#[test]
fn cli_pull_request_runs_only_pr_workflows() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(&[("review.yml", PR_ONLY), ("lint.yml", LINT)]);
    conveyor(&temp)
        .args(["run", "--event", "pull_request", "--pr", "7", "--ref", "dev"])
        .assert()
        .success()
        .stdout(predicate::str::contains("review / check"))
        .stdout(predicate::str::contains("lint /").not());
    Ok(())
}

#[test]
fn cli_run_with_dry_run() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(&[("lint.yml", LINT)]);
    conveyor(&temp)
        .args(["run", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dry-run mode"));
    assert!(!temp.path().join(".conveyor/state/history.json").exists());
    Ok(())
}

#[test]
fn cli_verbose_streams_output() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(&[("build.yml", BUILD)]);
    conveyor(&temp)
        .args(["run", "--verbose"])
        .assert()
        .success()
        .stdout(predicate::str::contains("building on linux"))
        .stdout(predicate::str::contains("building on mac"));
    Ok(())
}

#[test]
fn cli_list_shows_workflows() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(&[("build.yml", BUILD), ("review.yml", PR_ONLY)]);
    conveyor(&temp)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("linux | mac"))
        .stdout(predicate::str::contains("review-${{ event.number }}"));
    Ok(())
}

#[test]
fn cli_validate_reports_errors() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(&[("broken.yml", "on: push\njobs:\n  a:\n    steps: []\n")]);
    conveyor(&temp)
        .arg("validate")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("has no steps"));
    Ok(())
}

#[test]
fn cli_validate_passes() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(&[("build.yml", BUILD)]);
    conveyor(&temp)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 workflow valid"));
    Ok(())
}

#[test]
fn cli_schema_is_json() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let output = conveyor(&temp).arg("schema").output()?;
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert!(value["properties"]["jobs"].is_object());
    Ok(())
}

#[test]
fn cli_last_after_run() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(&[("lint.yml", LINT)]);
    conveyor(&temp).arg("run").assert().code(1);
    conveyor(&temp)
        .args(["last", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"failed\""));
    conveyor(&temp)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("[FAIL]"));
    Ok(())
}

#[test]
fn cli_config_flag_reads_single_file() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let file = temp.path().join("ci.yml");
    fs::write(&file, BUILD)?;
    conveyor(&temp)
        .args(["list", "--json", "--config"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"build\""));
    Ok(())
}

#[test]
fn cli_completions_bash() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("conveyor"));
    cmd.args(["completions", "bash"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("conveyor"));
    Ok(())
}
