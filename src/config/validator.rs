//! Configuration validation rules.
//!
//! This module validates workflows for correctness:
//! - Every workflow declares at least one trigger and one job
//! - Every job has at least one step
//! - Every step has exactly one of `run`, `artifact` or `comment`
//! - Conditions are `success()`, `always()` or `failure()`
//! - Expressions reference known operands and existing matrix axes
//! - Matrix axes are non-empty and excludes name existing axes
//! - Workflow names are unique

use crate::config::expression::{extract_expressions, parse_operands, Operand};
use crate::config::loader::LoadedWorkflow;
use crate::config::schema::{JobConfig, StepConfig};
use crate::error::{ConveyorError, Result};
use crate::steps::{is_valid_artifact_name, StepCondition};
use std::collections::HashSet;

/// Validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Rule identifier
    pub rule: String,
    /// Human-readable error message
    pub message: String,
    /// Workflow name
    pub workflow: String,
    /// Job id if error is job-specific
    pub job: Option<String>,
}

impl ValidationError {
    fn new(rule: &str, workflow: &str, job: Option<&str>, message: String) -> Self {
        Self {
            rule: rule.to_string(),
            message,
            workflow: workflow.to_string(),
            job: job.map(str::to_string),
        }
    }
}

/// Validate a set of workflows and return all errors.
///
/// Collects every error rather than stopping at the first one.
pub fn validate_workflows(workflows: &[LoadedWorkflow]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for workflow in workflows {
        if !seen.insert(workflow.name.as_str()) {
            errors.push(ValidationError::new(
                "duplicate-workflow",
                &workflow.name,
                None,
                format!(
                    "Workflow name '{}' is declared more than once ({})",
                    workflow.name,
                    workflow.path.display()
                ),
            ));
        }
        errors.extend(validate_workflow(workflow));
    }

    errors
}

/// Validate a single workflow.
pub fn validate_workflow(workflow: &LoadedWorkflow) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let name = workflow.name.as_str();
    let config = &workflow.config;

    if config.on.is_empty() {
        errors.push(ValidationError::new(
            "missing-trigger",
            name,
            None,
            format!("Workflow '{}' has no 'on' trigger", name),
        ));
    }

    if config.jobs.is_empty() {
        errors.push(ValidationError::new(
            "missing-jobs",
            name,
            None,
            format!("Workflow '{}' defines no jobs", name),
        ));
    }

    if let Some(concurrency) = &config.concurrency {
        check_expressions(&concurrency.group, &HashSet::new(), name, None, &mut errors);
    }
    for value in config.env.values() {
        check_expressions(value, &HashSet::new(), name, None, &mut errors);
    }

    for (job_id, job) in &config.jobs {
        errors.extend(validate_job(name, job_id, job));
    }

    errors
}

fn validate_job(workflow: &str, job_id: &str, job: &JobConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let job_ref = Some(job_id);

    if job.steps.is_empty() {
        errors.push(ValidationError::new(
            "empty-job",
            workflow,
            job_ref,
            format!("Job '{}' has no steps", job_id),
        ));
    }

    if job.timeout_minutes == Some(0) {
        errors.push(ValidationError::new(
            "zero-timeout",
            workflow,
            job_ref,
            format!("Job '{}' has timeout-minutes: 0", job_id),
        ));
    }

    let mut axes: HashSet<String> = HashSet::new();
    if let Some(strategy) = &job.strategy {
        for (axis, values) in &strategy.matrix {
            if values.is_empty() {
                errors.push(ValidationError::new(
                    "empty-matrix-axis",
                    workflow,
                    job_ref,
                    format!("Matrix axis '{}' in job '{}' has no values", axis, job_id),
                ));
            }
            axes.insert(axis.clone());
        }
        for exclude in &strategy.exclude {
            for key in exclude.keys() {
                if !strategy.matrix.contains_key(key) {
                    errors.push(ValidationError::new(
                        "unknown-matrix-axis",
                        workflow,
                        job_ref,
                        format!(
                            "Exclude in job '{}' names axis '{}' which is not in the matrix",
                            job_id, key
                        ),
                    ));
                }
            }
        }
        for include in &strategy.include {
            axes.extend(include.keys().cloned());
        }
    }

    for value in job.env.values() {
        check_expressions(value, &axes, workflow, job_ref, &mut errors);
    }

    for (index, step) in job.steps.iter().enumerate() {
        errors.extend(validate_step(workflow, job_id, index, step, &axes));
    }

    errors
}

fn validate_step(
    workflow: &str,
    job_id: &str,
    index: usize,
    step: &StepConfig,
    axes: &HashSet<String>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let job_ref = Some(job_id);
    let label = step
        .name
        .clone()
        .unwrap_or_else(|| format!("#{}", index + 1));

    let actions = [
        step.run.is_some(),
        step.artifact.is_some(),
        step.comment.is_some(),
    ]
    .iter()
    .filter(|set| **set)
    .count();

    if actions != 1 {
        errors.push(ValidationError::new(
            "step-action",
            workflow,
            job_ref,
            format!(
                "Step '{}' in job '{}' must have exactly one of 'run', 'artifact' or 'comment'",
                label, job_id
            ),
        ));
    }

    if let Some(run) = &step.run {
        if run.trim().is_empty() {
            errors.push(ValidationError::new(
                "empty-command",
                workflow,
                job_ref,
                format!("Step '{}' in job '{}' has an empty command", label, job_id),
            ));
        }
        check_expressions(run, axes, workflow, job_ref, &mut errors);
    }

    if let Some(artifact) = &step.artifact {
        if artifact.name.trim().is_empty() {
            errors.push(ValidationError::new(
                "artifact-name",
                workflow,
                job_ref,
                format!("Artifact step '{}' in job '{}' has no name", label, job_id),
            ));
        } else if !is_valid_artifact_name(&artifact.name) {
            errors.push(ValidationError::new(
                "artifact-name",
                workflow,
                job_ref,
                format!(
                    "Artifact name '{}' of step '{}' in job '{}' must not contain path separators or '..'",
                    artifact.name, label, job_id
                ),
            ));
        }
        check_expressions(
            &artifact.path.to_string_lossy(),
            axes,
            workflow,
            job_ref,
            &mut errors,
        );
    }

    if let Some(comment) = &step.comment {
        check_expressions(&comment.message, axes, workflow, job_ref, &mut errors);
    }

    if let Some(condition) = &step.condition {
        if let Err(e) = condition.parse::<StepCondition>() {
            errors.push(ValidationError::new(
                "invalid-condition",
                workflow,
                job_ref,
                format!("Step '{}' in job '{}': {}", label, job_id, e),
            ));
        }
    }

    if step.timeout_minutes == Some(0) {
        errors.push(ValidationError::new(
            "zero-timeout",
            workflow,
            job_ref,
            format!("Step '{}' in job '{}' has timeout-minutes: 0", label, job_id),
        ));
    }

    for value in step.env.values() {
        check_expressions(value, axes, workflow, job_ref, &mut errors);
    }

    errors
}

fn check_expressions(
    input: &str,
    axes: &HashSet<String>,
    workflow: &str,
    job: Option<&str>,
    errors: &mut Vec<ValidationError>,
) {
    for expr in extract_expressions(input) {
        match parse_operands(&expr) {
            Ok(operands) => {
                for operand in operands {
                    let Operand::Path(path) = operand else {
                        continue;
                    };
                    let Some(axis) = path.strip_prefix("matrix.") else {
                        continue;
                    };
                    if !axes.contains(axis) {
                        errors.push(ValidationError::new(
                            "unknown-matrix-axis",
                            workflow,
                            job,
                            format!("Expression references matrix axis '{}' which is not defined", axis),
                        ));
                    }
                }
            }
            Err(e) => errors.push(ValidationError::new(
                "invalid-expression",
                workflow,
                job,
                e.to_string(),
            )),
        }
    }
}

/// Validate workflows, returning an error summarizing every problem.
pub fn validate(workflows: &[LoadedWorkflow]) -> Result<()> {
    let errors = validate_workflows(workflows);

    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<_> = errors.iter().map(|e| e.message.clone()).collect();
        Err(ConveyorError::ConfigValidationError {
            message: messages.join("; "),
        })
    }
}
