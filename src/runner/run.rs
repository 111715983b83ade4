//! The run model: one job executed for one matrix combination.

use crate::config::EventKind;
use crate::steps::{ResolvedStep, StepOutcome, StepStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use super::matrix::MatrixCombination;

/// A unique run identifier.
///
/// Format: `run_{timestamp_ms}_{random_hex}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId {
    timestamp: DateTime<Utc>,
    random: [u8; 8],
}

impl RunId {
    /// Generate a new run ID.
    pub fn new() -> Self {
        let mut random = [0u8; 8];
        random.copy_from_slice(&uuid::Uuid::new_v4().as_bytes()[..8]);

        // Truncate to milliseconds for consistent serialization
        let now = Utc::now();
        let timestamp = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);

        Self { timestamp, random }
    }

    /// When the ID was generated.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Parse a run ID from a string.
    pub fn parse(s: &str) -> Option<Self> {
        let (millis, random_hex) = s.strip_prefix("run_")?.split_once('_')?;

        let timestamp = DateTime::from_timestamp_millis(millis.parse().ok()?)?;
        let bytes = hex::decode(random_hex).ok()?;
        let random: [u8; 8] = bytes.try_into().ok()?;

        Some(Self { timestamp, random })
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_{}_{}",
            self.timestamp.timestamp_millis(),
            hex::encode(self.random)
        )
    }
}

impl Serialize for RunId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RunId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid run id: {}", s)))
    }
}

/// Cancellation scope of a run.
///
/// Built from the resolved group template (workflow plus PR number or
/// ref by default), the job id and the matrix label, so sibling matrix
/// runs of one job never supersede each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupKey(String);

impl GroupKey {
    /// Build a key from its parts.
    pub fn new(group: &str, job: &str, label: &str) -> Self {
        if label.is_empty() {
            Self(format!("{}/{}", group, job))
        } else {
            Self(format!("{}/{}/{}", group, job, label))
        }
    }

    /// The key as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The event a run was started for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum TriggerEvent {
    /// Commits pushed to a branch.
    Push { reference: String },
    /// A pull request was opened or updated.
    PullRequest { number: u64, reference: String },
}

impl TriggerEvent {
    /// Push to `reference`.
    pub fn push(reference: impl Into<String>) -> Self {
        TriggerEvent::Push {
            reference: reference.into(),
        }
    }

    /// Pull request `number` targeting `reference`.
    pub fn pull_request(number: u64, reference: impl Into<String>) -> Self {
        TriggerEvent::PullRequest {
            number,
            reference: reference.into(),
        }
    }

    /// Event kind.
    pub fn kind(&self) -> EventKind {
        match self {
            TriggerEvent::Push { .. } => EventKind::Push,
            TriggerEvent::PullRequest { .. } => EventKind::PullRequest,
        }
    }

    /// Branch or ref the event applies to.
    pub fn reference(&self) -> &str {
        match self {
            TriggerEvent::Push { reference } | TriggerEvent::PullRequest { reference, .. } => {
                reference
            }
        }
    }

    /// Pull request number, if any.
    pub fn number(&self) -> Option<u64> {
        match self {
            TriggerEvent::Push { .. } => None,
            TriggerEvent::PullRequest { number, .. } => Some(*number),
        }
    }

    /// Branch name with any `refs/heads/` prefix removed.
    pub fn branch(&self) -> &str {
        let reference = self.reference();
        reference.strip_prefix("refs/heads/").unwrap_or(reference)
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerEvent::Push { reference } => write!(f, "push to {}", reference),
            TriggerEvent::PullRequest { number, reference } => {
                write!(f, "pull request #{} into {}", number, reference)
            }
        }
    }
}

/// Recognized run parameters plus the matrix values.
#[derive(Debug, Clone, PartialEq)]
pub struct RunParameters {
    /// Runtime release tag, or `latest`.
    pub runtime_version: String,

    /// Whether invoked tools may animate their console output.
    pub interactive_output: bool,

    /// All matrix values of the run.
    pub matrix: MatrixCombination,
}

/// Sentinel for "newest available runtime".
pub const LATEST: &str = "latest";

impl RunParameters {
    /// Environment variables exported to every step of the run.
    pub fn exported_env(&self) -> Vec<(String, String)> {
        let mut vars = vec![
            (
                "CONVEYOR_RUNTIME_VERSION".to_string(),
                self.runtime_version.clone(),
            ),
            (
                "CONVEYOR_INTERACTIVE_OUTPUT".to_string(),
                self.interactive_output.to_string(),
            ),
        ];

        if !self.interactive_output {
            vars.push(("NO_COLOR".to_string(), "1".to_string()));
            vars.push(("TERM".to_string(), "dumb".to_string()));
        }

        for (axis, value) in self.matrix.iter() {
            vars.push((matrix_env_name(axis), value.clone()));
        }

        vars
    }
}

impl Default for RunParameters {
    fn default() -> Self {
        Self {
            runtime_version: LATEST.to_string(),
            interactive_output: true,
            matrix: MatrixCombination::default(),
        }
    }
}

/// `MATRIX_<AXIS>`: upper-cased, `-` and `.` become `_`.
pub fn matrix_env_name(axis: &str) -> String {
    let name: String = axis
        .chars()
        .map(|c| match c {
            '-' | '.' | ' ' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect();
    format!("MATRIX_{}", name)
}

/// One execution of one job for one matrix combination.
#[derive(Debug, Clone)]
pub struct Run {
    /// Unique identifier.
    pub id: RunId,

    /// Workflow name.
    pub workflow: String,

    /// Job id.
    pub job: String,

    /// Matrix label (empty without a matrix).
    pub label: String,

    /// Event the run was planned for.
    pub event: TriggerEvent,

    /// Recognized parameters and matrix values.
    pub params: RunParameters,

    /// Cancellation scope.
    pub group: GroupKey,

    /// Steps in execution order.
    pub steps: Vec<ResolvedStep>,

    /// Merged run environment, expressions evaluated.
    pub env: HashMap<String, String>,

    /// Upper bound for the whole run.
    pub timeout: Duration,
}

impl Run {
    /// Human-readable name: `workflow / job (label)`.
    pub fn display_name(&self) -> String {
        display_name(&self.workflow, &self.job, &self.label)
    }
}

pub(crate) fn display_name(workflow: &str, job: &str, label: &str) -> String {
    if label.is_empty() {
        format!("{} / {}", workflow, job)
    } else {
        format!("{} / {} ({})", workflow, job, label)
    }
}

/// Overall status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// Display character, matching the step glyphs.
    pub fn display_char(&self) -> char {
        match self {
            RunStatus::Pending => StepStatus::Pending.display_char(),
            RunStatus::Running => StepStatus::Running.display_char(),
            RunStatus::Succeeded => StepStatus::Succeeded.display_char(),
            RunStatus::Failed => StepStatus::Failed.display_char(),
            RunStatus::Cancelled => StepStatus::Cancelled.display_char(),
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Result of executing a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Run identifier.
    pub run_id: RunId,

    /// Workflow name.
    pub workflow: String,

    /// Job id.
    pub job: String,

    /// Matrix label.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,

    /// Cancellation scope.
    pub group: GroupKey,

    /// Event the run was planned for.
    pub event: TriggerEvent,

    /// Overall status.
    pub status: RunStatus,

    /// One outcome per declared step, in order.
    pub outcomes: Vec<StepOutcome>,

    /// First failure of a required step, as `step: reason`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,

    /// Wall-clock start.
    pub started_at: DateTime<Utc>,

    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl RunResult {
    /// Human-readable name: `workflow / job (label)`.
    pub fn display_name(&self) -> String {
        display_name(&self.workflow, &self.job, &self.label)
    }

    /// Total duration.
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Outcome of the step called `name`.
    pub fn outcome(&self, name: &str) -> Option<&StepOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    /// Step statuses in declared order.
    pub fn statuses(&self) -> Vec<StepStatus> {
        self.outcomes.iter().map(|o| o.status).collect()
    }
}
