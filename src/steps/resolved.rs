//! Resolved step ready for execution.
//!
//! A ResolvedStep is a [`StepConfig`] with every expression evaluated for
//! one run, its action narrowed to a single tagged variant and its
//! condition parsed.

use crate::config::expression::{resolve_string, ExpressionContext};
use crate::config::StepConfig;
use crate::error::{ConveyorError, Result};
use indexmap::IndexMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// What a step does.
#[derive(Debug, Clone, PartialEq)]
pub enum StepAction {
    /// Run a command through the shell.
    Shell { run: String },
    /// Copy `path` into the run's artifact directory under `name`.
    Artifact { name: String, path: PathBuf },
    /// Post `message` for the run's group.
    Comment { message: String, allow_repeats: bool },
}

impl StepAction {
    /// Short description for dry runs and listings.
    pub fn describe(&self) -> String {
        match self {
            StepAction::Shell { run } => run.clone(),
            StepAction::Artifact { name, path } => {
                format!("upload {} as artifact '{}'", path.display(), name)
            }
            StepAction::Comment { allow_repeats, .. } => {
                if *allow_repeats {
                    "post comment".to_string()
                } else {
                    "post comment (once per group)".to_string()
                }
            }
        }
    }
}

/// When a step runs, relative to the outcome of the run so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StepCondition {
    /// Only while no required step has failed.
    #[default]
    Success,
    /// Regardless of earlier failures.
    Always,
    /// Only once a required step has failed.
    Failure,
}

impl StepCondition {
    /// Whether a failure of this step leaves the run status untouched.
    ///
    /// Only `success()` steps decide whether a run failed.
    pub fn is_always_run(&self) -> bool {
        !matches!(self, StepCondition::Success)
    }

    /// Whether a step with this condition runs, given the run state so far.
    pub fn should_run(&self, run_failed: bool) -> bool {
        match self {
            StepCondition::Success => !run_failed,
            StepCondition::Always => true,
            StepCondition::Failure => run_failed,
        }
    }
}

impl FromStr for StepCondition {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        let inner = trimmed
            .strip_prefix("${{")
            .and_then(|rest| rest.strip_suffix("}}"))
            .unwrap_or(trimmed)
            .trim();

        match inner {
            "success()" => Ok(Self::Success),
            "always()" => Ok(Self::Always),
            "failure()" => Ok(Self::Failure),
            _ => Err(format!(
                "unknown condition '{}' (expected success(), always() or failure())",
                s
            )),
        }
    }
}

impl fmt::Display for StepCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepCondition::Success => "success()",
            StepCondition::Always => "always()",
            StepCondition::Failure => "failure()",
        };
        write!(f, "{}", s)
    }
}

/// A fully resolved step ready for execution.
#[derive(Debug, Clone)]
pub struct ResolvedStep {
    /// Display name.
    pub name: String,

    /// What the step does.
    pub action: StepAction,

    /// When the step runs.
    pub condition: StepCondition,

    /// Step environment, expressions evaluated.
    pub env: IndexMap<String, String>,

    /// Working directory relative to the workspace.
    pub working_directory: Option<PathBuf>,

    /// Per-step timeout.
    pub timeout: Option<Duration>,
}

impl ResolvedStep {
    /// Create a plain shell step (mostly useful in tests and demos).
    pub fn shell(name: &str, run: &str) -> Self {
        Self {
            name: name.to_string(),
            action: StepAction::Shell {
                run: run.to_string(),
            },
            condition: StepCondition::Success,
            env: IndexMap::new(),
            working_directory: None,
            timeout: None,
        }
    }

    /// Set the condition.
    pub fn with_condition(mut self, condition: StepCondition) -> Self {
        self.condition = condition;
        self
    }

    /// Resolve a configured step for one run.
    ///
    /// `index` is the zero-based position in the job, used for the default
    /// name. `job_dir` is the job's working directory, if any.
    ///
    /// # Errors
    ///
    /// Returns `ConfigValidationError` if the step has no single action,
    /// an invalid condition, or a malformed expression.
    pub fn resolve(
        index: usize,
        config: &StepConfig,
        job_dir: Option<&PathBuf>,
        context: &ExpressionContext,
    ) -> Result<Self> {
        let action = match (&config.run, &config.artifact, &config.comment) {
            (Some(run), None, None) => StepAction::Shell {
                run: resolve_string(run, context)?,
            },
            (None, Some(artifact), None) => StepAction::Artifact {
                name: resolve_string(&artifact.name, context)?,
                path: PathBuf::from(resolve_string(&artifact.path.to_string_lossy(), context)?),
            },
            (None, None, Some(comment)) => StepAction::Comment {
                message: resolve_string(&comment.message, context)?,
                allow_repeats: comment.allow_repeats,
            },
            _ => {
                return Err(ConveyorError::ConfigValidationError {
                    message: format!(
                        "Step #{} must have exactly one of 'run', 'artifact' or 'comment'",
                        index + 1
                    ),
                })
            }
        };

        let condition = match &config.condition {
            Some(raw) => raw
                .parse()
                .map_err(|message| ConveyorError::ConfigValidationError { message })?,
            None => StepCondition::Success,
        };

        let name = match &config.name {
            Some(name) => resolve_string(name, context)?,
            None => default_name(index, &action),
        };

        let mut env = IndexMap::new();
        for (key, value) in &config.env {
            env.insert(key.clone(), resolve_string(value, context)?);
        }

        let working_directory = match (job_dir, &config.working_directory) {
            (Some(job), Some(step)) => Some(job.join(step)),
            (None, Some(step)) => Some(step.clone()),
            (Some(job), None) => Some(job.clone()),
            (None, None) => None,
        };

        Ok(Self {
            name,
            action,
            condition,
            env,
            working_directory,
            timeout: config.timeout_minutes.map(|m| Duration::from_secs(m * 60)),
        })
    }
}

fn default_name(index: usize, action: &StepAction) -> String {
    match action {
        StepAction::Shell { run } => {
            let first = run.lines().next().unwrap_or("").trim();
            if first.is_empty() {
                format!("step {}", index + 1)
            } else if first.chars().count() > 40 {
                let short: String = first.chars().take(37).collect();
                format!("{}...", short)
            } else {
                first.to_string()
            }
        }
        StepAction::Artifact { name, .. } => format!("upload {}", name),
        StepAction::Comment { .. } => "post comment".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArtifactConfig, CommentConfig};

    fn ctx() -> ExpressionContext {
        ExpressionContext::new()
            .with("matrix.runtime-version", "21.04.0")
            .with("workflow", "create-test")
    }

    #[test]
    fn condition_parsing() {
        assert_eq!("success()".parse(), Ok(StepCondition::Success));
        assert_eq!(" always() ".parse(), Ok(StepCondition::Always));
        assert_eq!("${{ failure() }}".parse(), Ok(StepCondition::Failure));
        assert!("cancelled()".parse::<StepCondition>().is_err());
    }

    #[test]
    fn condition_should_run() {
        assert!(StepCondition::Success.should_run(false));
        assert!(!StepCondition::Success.should_run(true));
        assert!(StepCondition::Always.should_run(false));
        assert!(StepCondition::Always.should_run(true));
        assert!(!StepCondition::Failure.should_run(false));
        assert!(StepCondition::Failure.should_run(true));
    }

    #[test]
    fn always_run_classification() {
        assert!(!StepCondition::Success.is_always_run());
        assert!(StepCondition::Always.is_always_run());
        assert!(StepCondition::Failure.is_always_run());
    }

    #[test]
    fn resolves_shell_step_with_expressions() {
        let config = StepConfig {
            name: Some("run ${{ matrix.runtime-version }}".to_string()),
            run: Some("nextflow run . -r ${{ matrix.runtime-version }}".to_string()),
            timeout_minutes: Some(5),
            ..Default::default()
        };

        let step = ResolvedStep::resolve(0, &config, None, &ctx()).unwrap();
        assert_eq!(step.name, "run 21.04.0");
        assert_eq!(
            step.action,
            StepAction::Shell {
                run: "nextflow run . -r 21.04.0".to_string()
            }
        );
        assert_eq!(step.condition, StepCondition::Success);
        assert_eq!(step.timeout, Some(Duration::from_secs(300)));
    }

    #[test]
    fn resolves_artifact_and_comment() {
        let artifact = StepConfig {
            artifact: Some(ArtifactConfig {
                name: "log-${{ matrix.runtime-version }}".to_string(),
                path: PathBuf::from(".nextflow.log"),
            }),
            condition: Some("always()".to_string()),
            ..Default::default()
        };
        let step = ResolvedStep::resolve(2, &artifact, None, &ctx()).unwrap();
        assert_eq!(step.name, "upload log-21.04.0");
        assert_eq!(step.condition, StepCondition::Always);

        let comment = StepConfig {
            comment: Some(CommentConfig {
                message: "${{ workflow }} failed".to_string(),
                allow_repeats: false,
            }),
            condition: Some("failure()".to_string()),
            ..Default::default()
        };
        let step = ResolvedStep::resolve(3, &comment, None, &ctx()).unwrap();
        assert_eq!(
            step.action,
            StepAction::Comment {
                message: "create-test failed".to_string(),
                allow_repeats: false
            }
        );
    }

    #[test]
    fn rejects_missing_action() {
        let err = ResolvedStep::resolve(0, &StepConfig::default(), None, &ctx()).unwrap_err();
        assert!(err.to_string().contains("exactly one"));
    }

    #[test]
    fn default_name_shortens_long_commands() {
        let config = StepConfig {
            run: Some(format!("echo {}\necho second", "x".repeat(60))),
            ..Default::default()
        };
        let step = ResolvedStep::resolve(0, &config, None, &ctx()).unwrap();
        assert!(step.name.ends_with("..."));
        assert_eq!(step.name.chars().count(), 40);
    }

    #[test]
    fn working_directory_nests_under_job() {
        let config = StepConfig {
            run: Some("ls".to_string()),
            working_directory: Some(PathBuf::from("sub")),
            ..Default::default()
        };
        let job_dir = PathBuf::from("pipeline");
        let step = ResolvedStep::resolve(0, &config, Some(&job_dir), &ctx()).unwrap();
        assert_eq!(step.working_directory, Some(PathBuf::from("pipeline/sub")));
    }
}
