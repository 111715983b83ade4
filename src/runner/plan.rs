//! Planning: a workflow plus a trigger event becomes a list of runs.

use crate::config::expression::{resolve_string, ExpressionContext};
use crate::config::{JobConfig, LoadedWorkflow, TriggerFilter, WorkflowConfig};
use crate::error::{ConveyorError, Result};
use crate::steps::ResolvedStep;
use indexmap::IndexMap;
use regex::Regex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::matrix::{expand, MatrixCombination};
use super::run::{GroupKey, Run, RunId, RunParameters, TriggerEvent, LATEST};

/// Group template used when a workflow declares no `concurrency.group`.
pub const DEFAULT_GROUP_TEMPLATE: &str = "${{ workflow }}-${{ event.number || event.ref }}";

/// Options that shape planned runs.
#[derive(Debug, Clone)]
pub struct PlanOptions {
    /// Only plan this job.
    pub job: Option<String>,

    /// Fallback for `interactive-output` when neither matrix nor workflow
    /// defaults set it.
    pub interactive_output: bool,

    /// Job timeout when the job declares none.
    pub job_timeout: Duration,

    /// Project-wide environment (lowest precedence).
    pub env: IndexMap<String, String>,

    /// Environment visible to `env.*` expressions beneath the run env.
    pub inherited_env: HashMap<String, String>,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            job: None,
            interactive_output: true,
            job_timeout: Duration::from_secs(360 * 60),
            env: IndexMap::new(),
            inherited_env: HashMap::new(),
        }
    }
}

/// Whether `workflow` is triggered by `event`.
pub fn is_triggered(workflow: &WorkflowConfig, event: &TriggerEvent) -> bool {
    workflow
        .on
        .entries()
        .into_iter()
        .filter(|(kind, _)| *kind == event.kind())
        .any(|(_, filter)| filter.map_or(true, |f| branch_matches(f, event.branch())))
}

fn branch_matches(filter: &TriggerFilter, branch: &str) -> bool {
    filter.branches.is_empty()
        || filter
            .branches
            .iter()
            .any(|pattern| glob_to_regex(pattern).is_some_and(|re| re.is_match(branch)))
}

/// Translate a branch glob: `*` stays within a path segment, `**` crosses them.
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '*' {
            if chars.peek() == Some(&'*') {
                chars.next();
                re.push_str(".*");
            } else {
                re.push_str("[^/]*");
            }
        } else {
            re.push_str(&regex::escape(&c.to_string()));
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

/// Plan every run `event` starts for `workflow`.
///
/// Returns no runs when the workflow isn't triggered by the event.
///
/// # Errors
///
/// Returns `ConfigValidationError` if `options.job` names no job of the
/// workflow or an expression cannot be evaluated.
pub fn plan(
    workflow: &LoadedWorkflow,
    event: &TriggerEvent,
    options: &PlanOptions,
) -> Result<Vec<Run>> {
    if let Some(job) = &options.job {
        if !workflow.config.jobs.contains_key(job) {
            return Err(ConveyorError::ConfigValidationError {
                message: format!("Workflow '{}' has no job '{}'", workflow.name, job),
            });
        }
    }

    if !is_triggered(&workflow.config, event) {
        debug!(workflow = %workflow.name, "Not triggered by {}", event);
        return Ok(Vec::new());
    }

    let mut runs = Vec::new();
    for (job_id, job) in &workflow.config.jobs {
        if options.job.as_ref().is_some_and(|j| j != job_id) {
            continue;
        }

        for combination in expand(job.strategy.as_ref()) {
            runs.push(plan_run(workflow, job_id, job, combination, event, options)?);
        }
    }

    debug!(workflow = %workflow.name, runs = runs.len(), "Planned runs for {}", event);
    Ok(runs)
}

fn plan_run(
    workflow: &LoadedWorkflow,
    job_id: &str,
    job: &JobConfig,
    matrix: MatrixCombination,
    event: &TriggerEvent,
    options: &PlanOptions,
) -> Result<Run> {
    let config = &workflow.config;
    let id = RunId::new();
    let label = matrix.label();

    let params = RunParameters {
        runtime_version: matrix
            .get("runtime-version")
            .map(str::to_string)
            .or_else(|| config.defaults.runtime_version.clone())
            .unwrap_or_else(|| LATEST.to_string()),
        interactive_output: matrix
            .get("interactive-output")
            .and_then(|v| v.parse().ok())
            .or(config.defaults.interactive_output)
            .unwrap_or(options.interactive_output),
        matrix,
    };

    let mut ctx = ExpressionContext::new()
        .with("workflow", workflow.name.as_str())
        .with("job", job_id)
        .with("run.id", id.to_string())
        .with("event.name", event.kind().to_string())
        .with("event.ref", event.reference())
        .with(
            "event.number",
            event.number().map(|n| n.to_string()).unwrap_or_default(),
        )
        .with("params.runtime-version", params.runtime_version.as_str())
        .with(
            "params.interactive-output",
            params.interactive_output.to_string(),
        );
    for (axis, value) in params.matrix.iter() {
        ctx.set(&format!("matrix.{}", axis), value.as_str());
    }

    // Exported parameters first, so configured env can override them.
    let mut env: HashMap<String, String> = params.exported_env().into_iter().collect();
    env.insert("CONVEYOR_RUN_ID".to_string(), id.to_string());
    env.insert("CONVEYOR_WORKFLOW".to_string(), workflow.name.clone());
    env.insert("CONVEYOR_JOB".to_string(), job_id.to_string());

    ctx.env = options.inherited_env.clone();
    ctx.env.extend(env.clone());
    for layer in [&options.env, &config.env, &job.env] {
        for (key, value) in layer {
            let resolved = resolve_string(value, &ctx)?;
            ctx.env.insert(key.clone(), resolved.clone());
            env.insert(key.clone(), resolved);
        }
    }

    let template = config
        .concurrency
        .as_ref()
        .map(|c| c.group.as_str())
        .unwrap_or(DEFAULT_GROUP_TEMPLATE);
    let group = GroupKey::new(&resolve_string(template, &ctx)?, job_id, &label);

    let steps = job
        .steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            ResolvedStep::resolve(index, step, job.working_directory.as_ref(), &ctx)
        })
        .collect::<Result<Vec<_>>>()?;

    let timeout = job
        .timeout_minutes
        .map(|m| Duration::from_secs(m * 60))
        .unwrap_or(options.job_timeout);

    Ok(Run {
        id,
        workflow: workflow.name.clone(),
        job: job_id.to_string(),
        label,
        event: event.clone(),
        params,
        group,
        steps,
        env,
        timeout,
    })
}
