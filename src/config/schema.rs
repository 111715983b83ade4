//! Configuration schema definitions for Conveyor.
//!
//! This module contains the struct definitions that map to the workflow
//! files (`.conveyor/workflows/*.yml`) and the optional project settings
//! file (`.conveyor/config.yml`).

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Root structure of a workflow file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct WorkflowConfig {
    /// Workflow name (defaults to the file stem)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Events that trigger this workflow
    pub on: TriggerSpec,

    /// Cancellation group for superseding stale runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<ConcurrencyConfig>,

    /// Environment variables for every job
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,

    /// Fallback values for recognized run parameters
    pub defaults: ParameterDefaults,

    /// Job definitions, in declaration order
    pub jobs: IndexMap<String, JobConfig>,
}

/// Kinds of events that start a run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Push,
    PullRequest,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Push => write!(f, "push"),
            EventKind::PullRequest => write!(f, "pull_request"),
        }
    }
}

/// The `on:` block.
///
/// Accepts `on: push`, `on: [push, pull_request]` or a map whose values
/// optionally restrict the branches:
///
/// ```yaml
/// on:
///   push:
///     branches: [dev]
///   pull_request:
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum TriggerSpec {
    Single(EventKind),
    List(Vec<EventKind>),
    Map(IndexMap<EventKind, Option<TriggerFilter>>),
}

impl Default for TriggerSpec {
    fn default() -> Self {
        TriggerSpec::List(Vec::new())
    }
}

impl TriggerSpec {
    /// Every listed event kind with its optional branch filter.
    pub fn entries(&self) -> Vec<(EventKind, Option<&TriggerFilter>)> {
        match self {
            TriggerSpec::Single(kind) => vec![(*kind, None)],
            TriggerSpec::List(kinds) => kinds.iter().map(|k| (*k, None)).collect(),
            TriggerSpec::Map(map) => map.iter().map(|(k, f)| (*k, f.as_ref())).collect(),
        }
    }

    /// Whether no trigger is declared at all.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// Branch restriction for a trigger.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TriggerFilter {
    /// Branch names or globs (`release/*`). Empty means every branch.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<String>,
}

/// The `concurrency:` block.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub struct ConcurrencyConfig {
    /// Group expression, e.g. `${{ workflow }}-${{ event.number || event.ref }}`
    pub group: String,
}

/// Workflow-level defaults for recognized run parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct ParameterDefaults {
    /// Runtime release tag, or `latest`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,

    /// Whether invoked tools may animate their console output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interactive_output: Option<bool>,
}

/// A single job: an ordered step list, optionally fanned out by a matrix.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct JobConfig {
    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Upper bound for the whole run of this job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_minutes: Option<u64>,

    /// Matrix strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyConfig>,

    /// Job environment (overrides workflow env)
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,

    /// Default working directory for steps, relative to the workspace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,

    /// Steps, executed in order
    pub steps: Vec<StepConfig>,
}

/// The `strategy:` block of a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct StrategyConfig {
    /// Axis name -> values
    pub matrix: IndexMap<String, Vec<MatrixValue>>,

    /// Combinations to drop (partial matches allowed)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<IndexMap<String, MatrixValue>>,

    /// Extra combinations appended after the product
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<IndexMap<String, MatrixValue>>,
}

/// A scalar matrix value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum MatrixValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for MatrixValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatrixValue::Bool(b) => write!(f, "{}", b),
            MatrixValue::Int(i) => write!(f, "{}", i),
            MatrixValue::Float(x) => write!(f, "{}", x),
            MatrixValue::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for MatrixValue {
    fn from(s: &str) -> Self {
        MatrixValue::String(s.to_string())
    }
}

/// A single step. Exactly one of `run`, `artifact` or `comment` is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct StepConfig {
    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Shell command to execute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,

    /// Copy a file or directory into the run's artifact directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactConfig>,

    /// Post a comment for the run's group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<CommentConfig>,

    /// Execution condition: `success()` (default), `always()` or `failure()`
    #[serde(rename = "if", skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// Step environment (overrides job env)
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,

    /// Working directory, relative to the job's
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,

    /// Kill the step after this many minutes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_minutes: Option<u64>,
}

/// Artifact upload parameters.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ArtifactConfig {
    /// Artifact name (directory under the run's artifact dir)
    pub name: String,
    /// Source file or directory, relative to the working directory
    pub path: PathBuf,
}

/// Comment parameters.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub struct CommentConfig {
    /// Message template (expressions allowed)
    pub message: String,
    /// Post the same message again on later runs of the group
    #[serde(default)]
    pub allow_repeats: bool,
}

/// Root structure of `.conveyor/config.yml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Global settings
    pub settings: Settings,
}

/// Project-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Maximum concurrent runs
    pub max_parallel: usize,

    /// History retention count
    pub history_retention: usize,

    /// Default job timeout in minutes
    pub job_timeout_minutes: u64,

    /// Where artifact steps copy files to (relative to project root)
    pub artifacts_dir: PathBuf,

    /// Where comment steps post to (relative to project root)
    pub comments_dir: PathBuf,

    /// Where history, comment ledger and leases live (relative to project root)
    pub state_dir: PathBuf,

    /// Default output mode: verbose, normal, quiet, silent
    pub default_output: OutputMode,

    /// Environment variables for every run
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,

    /// Additional env var names whose values are masked in output
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secret_env: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            history_retention: default_history_retention(),
            job_timeout_minutes: default_job_timeout_minutes(),
            artifacts_dir: PathBuf::from(".conveyor/artifacts"),
            comments_dir: PathBuf::from(".conveyor/comments"),
            state_dir: PathBuf::from(".conveyor/state"),
            default_output: OutputMode::Normal,
            env: IndexMap::new(),
            secret_env: Vec::new(),
        }
    }
}

fn default_max_parallel() -> usize {
    4
}

fn default_history_retention() -> usize {
    50
}

fn default_job_timeout_minutes() -> u64 {
    360
}

/// Output verbosity mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    Verbose,
    #[default]
    Normal,
    Quiet,
    Silent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_workflow() {
        let yaml = r#"
name: create-test
on:
  push:
    branches: [dev]
  pull_request:
concurrency:
  group: ${{ workflow }}-${{ event.number || event.ref }}
env:
  NXF_ANSI_LOG: "false"
defaults:
  runtime-version: latest
jobs:
  make-pipeline:
    timeout-minutes: 60
    strategy:
      matrix:
        runtime-version: ["21.04.0", latest]
    steps:
      - name: create
        run: nf-core create --name testpipeline --plain
      - name: upload log
        if: always()
        artifact: { name: log, path: .nextflow.log }
      - name: comment
        if: failure()
        comment:
          message: "lint failed"
"#;
        let config: WorkflowConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.name.as_deref(), Some("create-test"));
        assert_eq!(config.env["NXF_ANSI_LOG"], "false");
        assert_eq!(config.defaults.runtime_version.as_deref(), Some("latest"));

        let entries = config.on.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, EventKind::Push);
        assert_eq!(entries[0].1.unwrap().branches, vec!["dev"]);
        assert_eq!(entries[1].0, EventKind::PullRequest);
        assert!(entries[1].1.is_none());

        let job = &config.jobs["make-pipeline"];
        assert_eq!(job.timeout_minutes, Some(60));
        assert_eq!(job.steps.len(), 3);
        assert_eq!(job.steps[1].condition.as_deref(), Some("always()"));
        assert_eq!(job.steps[1].artifact.as_ref().unwrap().name, "log");
        assert!(!job.steps[2].comment.as_ref().unwrap().allow_repeats);

        let matrix = &job.strategy.as_ref().unwrap().matrix;
        assert_eq!(
            matrix["runtime-version"],
            vec![MatrixValue::from("21.04.0"), MatrixValue::from("latest")]
        );
    }

    #[test]
    fn parses_single_and_list_triggers() {
        let single: WorkflowConfig = serde_yaml::from_str("on: push\njobs: {}").unwrap();
        assert_eq!(single.on.entries().len(), 1);

        let list: WorkflowConfig =
            serde_yaml::from_str("on: [push, pull_request]\njobs: {}").unwrap();
        let kinds: Vec<_> = list.on.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(kinds, vec![EventKind::Push, EventKind::PullRequest]);
    }

    #[test]
    fn missing_trigger_is_empty() {
        let config: WorkflowConfig = serde_yaml::from_str("jobs: {}").unwrap();
        assert!(config.on.is_empty());
    }

    #[test]
    fn jobs_keep_declaration_order() {
        let yaml = "jobs:\n  zeta: {steps: []}\n  alpha: {steps: []}\n  mid: {steps: []}\n";
        let config: WorkflowConfig = serde_yaml::from_str(yaml).unwrap();
        let names: Vec<_> = config.jobs.keys().cloned().collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn matrix_value_display() {
        assert_eq!(MatrixValue::Bool(true).to_string(), "true");
        assert_eq!(MatrixValue::Int(3).to_string(), "3");
        assert_eq!(MatrixValue::from("21.04.0").to_string(), "21.04.0");
    }

    #[test]
    fn settings_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.max_parallel, 4);
        assert_eq!(settings.history_retention, 50);
        assert_eq!(settings.job_timeout_minutes, 360);
        assert_eq!(settings.default_output, OutputMode::Normal);
    }

    #[test]
    fn project_config_partial_settings() {
        let config: ProjectConfig =
            serde_yaml::from_str("settings:\n  max_parallel: 2\n  default_output: quiet\n")
                .unwrap();
        assert_eq!(config.settings.max_parallel, 2);
        assert_eq!(config.settings.default_output, OutputMode::Quiet);
        assert_eq!(config.settings.history_retention, 50);
    }
}
