//! Run coordinator: executes the steps of one run in order.
//!
//! Step gating follows the run state so far:
//!
//! | condition   | runs when                          |
//! |-------------|------------------------------------|
//! | `success()` | no `success()` step has failed yet |
//! | `always()`  | always                             |
//! | `failure()` | a `success()` step has failed      |
//!
//! Only `success()` failures fail the run. Cancellation is checked before
//! every step; once seen, no further step runs (not even `always()`), and
//! the remaining steps are recorded as cancelled.

use crate::secrets::OutputMasker;
use crate::steps::{
    execute_step, CommentSink, ExecutionOptions, StepCondition, StepContext, StepOutcome,
    StepStatus,
};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::cancel::CancelToken;
use super::events::{EventSink, RunEvent};
use super::run::{Run, RunResult, RunStatus};

/// Executes runs.
pub struct RunCoordinator {
    workspace: PathBuf,
    artifacts_dir: PathBuf,
    comments: Arc<dyn CommentSink>,
    masker: OutputMasker,
    dry_run: bool,
}

impl RunCoordinator {
    /// Create a coordinator for a workspace.
    pub fn new(
        workspace: impl Into<PathBuf>,
        artifacts_dir: impl Into<PathBuf>,
        comments: Arc<dyn CommentSink>,
    ) -> Self {
        Self {
            workspace: workspace.into(),
            artifacts_dir: artifacts_dir.into(),
            comments,
            masker: OutputMasker::new(),
            dry_run: false,
        }
    }

    /// Redact these secrets from all captured output.
    pub fn with_masker(mut self, masker: OutputMasker) -> Self {
        self.masker = masker;
        self
    }

    /// Report steps instead of executing them.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Execute `run` until its last step, or until `token` is cancelled.
    pub fn execute(&self, run: &Run, token: &CancelToken, sink: &dyn EventSink) -> RunResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let deadline = start + run.timeout;

        info!(run_id = %run.id, group = %run.group, "Starting {}", run.display_name());
        sink.emit(RunEvent::RunStarted {
            run_id: run.id.clone(),
            name: run.display_name(),
            steps: run.steps.len(),
        });

        let run_id = run.id.to_string();
        let ctx = StepContext {
            workspace: &self.workspace,
            env: &run.env,
            run_id: &run_id,
            group: run.group.as_str(),
            artifacts_dir: &self.artifacts_dir,
            comments: self.comments.as_ref(),
            masker: &self.masker,
        };

        let mut outcomes: Vec<StepOutcome> = Vec::with_capacity(run.steps.len());
        let mut failure: Option<String> = None;
        let mut cancelled = false;

        for (index, step) in run.steps.iter().enumerate() {
            if cancelled || token.is_cancelled() {
                cancelled = true;
                let outcome = StepOutcome::cancelled(&step.name);
                sink.emit(RunEvent::StepFinished {
                    run_id: run.id.clone(),
                    outcome: outcome.clone(),
                });
                outcomes.push(outcome);
                continue;
            }

            let run_failed = failure.is_some();
            if !step.condition.should_run(run_failed) {
                let reason = match step.condition {
                    StepCondition::Failure => "no earlier step failed",
                    _ => "an earlier step failed",
                };
                debug!(run_id = %run.id, step = %step.name, "Skipping: {}", reason);
                let outcome = StepOutcome::skipped(&step.name, reason);
                sink.emit(RunEvent::StepFinished {
                    run_id: run.id.clone(),
                    outcome: outcome.clone(),
                });
                outcomes.push(outcome);
                continue;
            }

            sink.emit(RunEvent::StepStarted {
                run_id: run.id.clone(),
                step: step.name.clone(),
                index,
            });

            // always()/failure() steps outlive the job deadline; their own
            // timeout still applies.
            let options = ExecutionOptions {
                dry_run: self.dry_run,
                deadline: (!step.condition.is_always_run()).then_some(deadline),
            };

            let outcome = match execute_step(
                step,
                &ctx,
                &options,
                &mut |line| {
                    sink.emit(RunEvent::StepOutput {
                        run_id: run.id.clone(),
                        line: line.clone(),
                    })
                },
                &|| token.is_cancelled(),
            ) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(run_id = %run.id, step = %step.name, "Step errored: {}", e);
                    StepOutcome::failed(&step.name, e.to_string())
                }
            };

            match outcome.status {
                StepStatus::Cancelled => cancelled = true,
                StepStatus::Failed if !step.condition.is_always_run() && failure.is_none() => {
                    let reason = outcome.message.as_deref().unwrap_or("failed");
                    failure = Some(format!("{}: {}", step.name, reason));
                }
                StepStatus::Failed => {
                    debug!(run_id = %run.id, step = %step.name, "Always-run step failed");
                }
                _ => {}
            }

            sink.emit(RunEvent::StepFinished {
                run_id: run.id.clone(),
                outcome: outcome.clone(),
            });
            outcomes.push(outcome);
        }

        let status = if cancelled {
            RunStatus::Cancelled
        } else if failure.is_some() {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        };

        info!(run_id = %run.id, status = %status, "Finished {}", run.display_name());

        let result = RunResult {
            run_id: run.id.clone(),
            workflow: run.workflow.clone(),
            job: run.job.clone(),
            label: run.label.clone(),
            group: run.group.clone(),
            event: run.event.clone(),
            status,
            outcomes,
            failure,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        sink.emit(RunEvent::RunFinished {
            result: result.clone(),
        });
        result
    }
}
