//! Step execution engine.
//!
//! Executes one resolved step: a shell command, an artifact upload or a
//! comment. Step failures are reported as a [`StepOutcome`]; `Err` is only
//! returned when the step could not be attempted at all.

use crate::error::{ConveyorError, Result};
use crate::secrets::OutputMasker;
use crate::shell::{execute_controlled, CommandOptions, OutputLine, Termination};
use crate::steps::artifact::upload_artifact;
use crate::steps::comment::{CommentDelivery, CommentSink};
use crate::steps::resolved::{ResolvedStep, StepAction};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// Status of a step within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Waiting to run.
    Pending,

    /// Currently executing.
    Running,

    /// Finished successfully.
    Succeeded,

    /// Finished with a failure.
    Failed,

    /// Not run because its condition was false.
    Skipped,

    /// Not run, or killed, because the run was cancelled.
    Cancelled,
}

impl StepStatus {
    /// Check if this is a terminal state (no more changes expected).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StepStatus::Pending | StepStatus::Running)
    }

    /// Get a display character for this status.
    pub fn display_char(&self) -> char {
        match self {
            StepStatus::Pending => '○',
            StepStatus::Running => '◉',
            StepStatus::Succeeded => '✓',
            StepStatus::Failed => '✗',
            StepStatus::Skipped => '⊘',
            StepStatus::Cancelled => '⊗',
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Succeeded => "succeeded",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
            StepStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Recorded outcome of one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Step name.
    pub name: String,

    /// Final status.
    pub status: StepStatus,

    /// Exit code, if a command ran and exited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    /// Captured standard output, secrets masked.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stdout: String,

    /// Captured standard error, secrets masked.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr: String,

    /// Execution duration.
    #[serde(with = "duration_ms")]
    pub duration: Duration,

    /// Failure reason, skip reason or delivery note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StepOutcome {
    fn new(name: &str, status: StepStatus) -> Self {
        Self {
            name: name.to_string(),
            status,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            duration: Duration::ZERO,
            message: None,
        }
    }

    /// A successful outcome with the given output.
    pub fn succeeded(name: &str, stdout: impl Into<String>) -> Self {
        let mut outcome = Self::new(name, StepStatus::Succeeded);
        outcome.stdout = stdout.into();
        outcome
    }

    /// A failed outcome.
    pub fn failed(name: &str, message: impl Into<String>) -> Self {
        let mut outcome = Self::new(name, StepStatus::Failed);
        outcome.message = Some(message.into());
        outcome
    }

    /// A skipped outcome.
    pub fn skipped(name: &str, reason: impl Into<String>) -> Self {
        let mut outcome = Self::new(name, StepStatus::Skipped);
        outcome.message = Some(reason.into());
        outcome
    }

    /// A cancelled outcome.
    pub fn cancelled(name: &str) -> Self {
        Self::new(name, StepStatus::Cancelled)
    }

    fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Generate a summary line for display.
    pub fn summary_line(&self) -> String {
        let c = self.status.display_char();
        match self.status {
            StepStatus::Succeeded => {
                format!("{} {} ({})", c, self.name, format_duration(self.duration))
            }
            StepStatus::Failed => {
                let error = self.message.as_deref().unwrap_or("unknown error");
                format!("{} {} - {}", c, self.name, error)
            }
            StepStatus::Skipped => match &self.message {
                Some(reason) => format!("{} {} ({})", c, self.name, reason),
                None => format!("{} {}", c, self.name),
            },
            _ => format!("{} {} ({})", c, self.name, self.status),
        }
    }
}

/// Format a duration compactly: `500ms`, `5.0s`, `1m 5s`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs == 0 {
        format!("{}ms", millis)
    } else if secs < 60 {
        format!("{}.{}s", secs, millis / 100)
    } else {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Where and for whom a step executes.
pub struct StepContext<'a> {
    /// Workspace root; relative paths resolve against it.
    pub workspace: &'a Path,

    /// Run environment (step env is layered on top).
    pub env: &'a HashMap<String, String>,

    /// Identifier of the run.
    pub run_id: &'a str,

    /// Group key of the run, used for comment de-duplication.
    pub group: &'a str,

    /// Root directory for artifact uploads.
    pub artifacts_dir: &'a Path,

    /// Destination for comment steps.
    pub comments: &'a dyn CommentSink,

    /// Redacts secrets from output.
    pub masker: &'a OutputMasker,
}

/// Options for step execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionOptions {
    /// Report what would run without running it.
    pub dry_run: bool,

    /// Hard deadline inherited from the job timeout.
    pub deadline: Option<Instant>,
}

/// Execute a single step.
///
/// `on_line` receives masked output lines as they arrive. `interrupt` is
/// polled while a command runs; once it returns true the command is killed
/// and the outcome is `Cancelled`.
///
/// # Errors
///
/// Returns `StepExecutionError` for an empty command and propagates spawn
/// failures; the coordinator turns both into a failed outcome.
pub fn execute_step(
    step: &ResolvedStep,
    ctx: &StepContext<'_>,
    options: &ExecutionOptions,
    on_line: &mut dyn FnMut(&OutputLine),
    interrupt: &dyn Fn() -> bool,
) -> Result<StepOutcome> {
    if options.dry_run {
        return Ok(StepOutcome::succeeded(
            &step.name,
            format!("Would run: {}", step.action.describe()),
        ));
    }

    let cwd = match &step.working_directory {
        Some(dir) => ctx.workspace.join(dir),
        None => ctx.workspace.to_path_buf(),
    };

    match &step.action {
        StepAction::Shell { run } => run_shell(step, run, cwd, ctx, options, on_line, interrupt),
        StepAction::Artifact { name, path } => {
            let start = Instant::now();
            let source = cwd.join(path);
            match upload_artifact(&step.name, &source, ctx.artifacts_dir, ctx.run_id, name) {
                Ok(dir) => Ok(StepOutcome::succeeded(
                    &step.name,
                    format!("Uploaded {} to {}", source.display(), dir.display()),
                )
                .with_duration(start.elapsed())),
                Err(ConveyorError::StepExecutionError { message, .. }) => {
                    Ok(StepOutcome::failed(&step.name, message).with_duration(start.elapsed()))
                }
                Err(e) => Err(e),
            }
        }
        StepAction::Comment {
            message,
            allow_repeats,
        } => {
            let start = Instant::now();
            let message = ctx.masker.mask(message);
            let note = match ctx.comments.post(ctx.group, &message, *allow_repeats)? {
                CommentDelivery::Posted => "comment posted",
                CommentDelivery::AlreadyPosted => "already posted",
            };
            let mut outcome =
                StepOutcome::succeeded(&step.name, String::new()).with_duration(start.elapsed());
            outcome.message = Some(note.to_string());
            Ok(outcome)
        }
    }
}

fn run_shell(
    step: &ResolvedStep,
    command: &str,
    cwd: PathBuf,
    ctx: &StepContext<'_>,
    options: &ExecutionOptions,
    on_line: &mut dyn FnMut(&OutputLine),
    interrupt: &dyn Fn() -> bool,
) -> Result<StepOutcome> {
    if command.trim().is_empty() {
        return Err(ConveyorError::StepExecutionError {
            step: step.name.clone(),
            message: "step has no command to execute (command is empty)".to_string(),
        });
    }

    let remaining = options
        .deadline
        .map(|d| d.saturating_duration_since(Instant::now()));
    if remaining == Some(Duration::ZERO) {
        return Ok(StepOutcome::failed(&step.name, "job timed out before the step started"));
    }

    let job_bound = match (remaining, step.timeout) {
        (Some(r), Some(t)) => r < t,
        (Some(_), None) => true,
        _ => false,
    };
    let timeout = match (remaining, step.timeout) {
        (Some(r), Some(t)) => Some(r.min(t)),
        (r, t) => r.or(t),
    };

    let mut env = ctx.env.clone();
    env.extend(step.env.iter().map(|(k, v)| (k.clone(), v.clone())));

    let cmd_options = CommandOptions {
        cwd: Some(cwd),
        env,
        timeout,
    };

    debug!(step = %step.name, "Running '{}'", command);

    let masker = ctx.masker;
    let result = execute_controlled(
        command,
        &cmd_options,
        &mut |line| {
            let masked = match line {
                OutputLine::Stdout(s) => OutputLine::Stdout(masker.mask(&s)),
                OutputLine::Stderr(s) => OutputLine::Stderr(masker.mask(&s)),
            };
            on_line(&masked);
        },
        interrupt,
    )?;

    let mut outcome = match result.termination {
        Termination::Interrupted => StepOutcome::cancelled(&step.name),
        Termination::TimedOut => {
            let reason = if job_bound {
                "job timed out".to_string()
            } else {
                format!("timed out after {}", format_duration(result.duration))
            };
            StepOutcome::failed(&step.name, reason)
        }
        Termination::Exited if result.success => StepOutcome::succeeded(&step.name, String::new()),
        Termination::Exited => match result.exit_code {
            Some(code) => StepOutcome::failed(&step.name, format!("exited with code {}", code)),
            None => StepOutcome::failed(&step.name, "terminated by signal"),
        },
    };

    outcome.exit_code = result.exit_code;
    outcome.stdout = masker.mask(&result.stdout);
    outcome.stderr = masker.mask(&result.stderr);
    Ok(outcome.with_duration(result.duration))
}
