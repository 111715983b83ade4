//! Run history recording.
//!
//! One invocation of `conveyor run` produces a [`RunRecord`]: the event it
//! was planned for plus the [`RunResult`] of every run it executed.
//! [`RunHistoryBuilder`] collects results as runs finish.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::runner::{RunResult, RunStatus, TriggerEvent};

/// A record of a single invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// When the invocation started.
    pub timestamp: DateTime<Utc>,

    /// Workflow filter, if one was given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,

    /// Trigger event.
    pub event: TriggerEvent,

    /// Total duration in milliseconds.
    pub duration_ms: u64,

    /// Overall status.
    pub status: RunStatus,

    /// Every run executed, in planned order.
    #[serde(default)]
    pub runs: Vec<RunResult>,
}

impl RunRecord {
    /// Runs that ended with the given status.
    pub fn runs_with_status(&self, status: RunStatus) -> impl Iterator<Item = &RunResult> {
        self.runs.iter().filter(move |r| r.status == status)
    }

    /// Whether any run failed.
    pub fn has_failures(&self) -> bool {
        self.runs_with_status(RunStatus::Failed).next().is_some()
    }
}

/// Combine run statuses into one.
///
/// Any failure fails the whole. Superseded runs only count when nothing
/// else ran. No runs at all is a success.
pub fn overall_status<'a>(runs: impl IntoIterator<Item = &'a RunResult>) -> RunStatus {
    let mut any = false;
    let mut all_cancelled = true;
    for run in runs {
        any = true;
        match run.status {
            RunStatus::Failed => return RunStatus::Failed,
            RunStatus::Cancelled => {}
            _ => all_cancelled = false,
        }
    }
    if any && all_cancelled {
        RunStatus::Cancelled
    } else {
        RunStatus::Succeeded
    }
}

/// Helper for building a record while runs finish.
pub struct RunHistoryBuilder {
    workflow: Option<String>,
    event: TriggerEvent,
    start_time: DateTime<Utc>,
    runs: Vec<RunResult>,
}

impl RunHistoryBuilder {
    /// Start a new record.
    pub fn start(workflow: Option<&str>, event: &TriggerEvent) -> Self {
        Self {
            workflow: workflow.map(str::to_string),
            event: event.clone(),
            start_time: Utc::now(),
            runs: Vec::new(),
        }
    }

    /// Add a finished run.
    pub fn add(&mut self, result: RunResult) {
        self.runs.push(result);
    }

    /// Add several finished runs.
    pub fn extend(&mut self, results: impl IntoIterator<Item = RunResult>) {
        self.runs.extend(results);
    }

    /// Close the record.
    pub fn finish(self) -> RunRecord {
        let status = overall_status(&self.runs);
        RunRecord {
            timestamp: self.start_time,
            workflow: self.workflow,
            event: self.event,
            duration_ms: (Utc::now() - self.start_time).num_milliseconds().max(0) as u64,
            status,
            runs: self.runs,
        }
    }
}
