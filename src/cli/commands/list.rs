//! List command implementation.
//!
//! The `conveyor list` command shows each workflow with its triggers,
//! concurrency group and jobs, including the matrix combinations a job
//! fans out to.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::cli::args::ListArgs;
use crate::config::{load_settings, LoadedWorkflow};
use crate::error::Result;
use crate::runner::{expand, DEFAULT_GROUP_TEMPLATE};
use crate::ui::theme::ConveyorTheme;
use crate::ui::{OutputMode, UserInterface};

use super::dispatcher::{load_or_report, Command, CommandResult, EXIT_CONFIG};

/// The list command implementation.
pub struct ListCommand {
    project_root: PathBuf,
    config: Option<PathBuf>,
    args: ListArgs,
}

impl ListCommand {
    /// Create a new list command.
    pub fn new(project_root: &Path, config: Option<PathBuf>, args: ListArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config,
            args,
        }
    }

    /// Get the project root path.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Get the command arguments.
    pub fn args(&self) -> &ListArgs {
        &self.args
    }
}

fn triggers(workflow: &LoadedWorkflow) -> Vec<String> {
    workflow
        .config
        .on
        .entries()
        .into_iter()
        .map(|(kind, filter)| match filter {
            Some(f) if !f.branches.is_empty() => format!("{} [{}]", kind, f.branches.join(", ")),
            _ => kind.to_string(),
        })
        .collect()
}

fn group_template(workflow: &LoadedWorkflow) -> &str {
    workflow
        .config
        .concurrency
        .as_ref()
        .map_or(DEFAULT_GROUP_TEMPLATE, |c| c.group.as_str())
}

fn matrix_labels(workflow: &LoadedWorkflow, job: &str) -> Vec<String> {
    let strategy = workflow
        .config
        .jobs
        .get(job)
        .and_then(|j| j.strategy.as_ref());
    expand(strategy)
        .into_iter()
        .map(|c| c.label())
        .filter(|label| !label.is_empty())
        .collect()
}

fn to_json(workflows: &[LoadedWorkflow]) -> Value {
    let list: Vec<Value> = workflows
        .iter()
        .map(|w| {
            let jobs: Vec<Value> = w
                .config
                .jobs
                .iter()
                .map(|(id, job)| {
                    json!({
                        "id": id,
                        "name": job.name,
                        "steps": job.steps.len(),
                        "matrix": matrix_labels(w, id),
                    })
                })
                .collect();
            json!({
                "name": w.name,
                "path": w.path,
                "triggers": triggers(w),
                "group": group_template(w),
                "jobs": jobs,
            })
        })
        .collect();
    Value::Array(list)
}

impl Command for ListCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let settings = load_settings(&self.project_root)?;

        // Apply config default_output when no CLI flag was explicitly set
        if ui.output_mode() == OutputMode::Normal {
            ui.set_output_mode(settings.default_output.into());
        }

        let Some(workflows) = load_or_report(&self.project_root, self.config.as_deref(), ui)? else {
            return Ok(CommandResult::failure(EXIT_CONFIG));
        };

        if self.args.json {
            let out = serde_json::to_string_pretty(&to_json(&workflows))?;
            ui.message(&out);
            return Ok(CommandResult::success());
        }

        let theme = ConveyorTheme::detect();

        for (i, workflow) in workflows.iter().enumerate() {
            if i > 0 {
                ui.message("");
            }
            ui.message(&format!(
                "  {} {}",
                theme.highlight.apply_to(&workflow.name),
                theme.dim.apply_to(format!("({})", triggers(workflow).join(", ")))
            ));
            ui.message(&format!(
                "    {} {}",
                theme.key.apply_to("group:"),
                theme.dim.apply_to(group_template(workflow))
            ));

            for (id, job) in &workflow.config.jobs {
                let steps = job.steps.len();
                let noun = if steps == 1 { "step" } else { "steps" };
                ui.message(&format!(
                    "    {} {}",
                    theme.key.apply_to(id),
                    theme.dim.apply_to(format!("· {} {}", steps, noun))
                ));

                let labels = matrix_labels(workflow, id);
                if !labels.is_empty() {
                    ui.message(&format!(
                        "      {} {}",
                        theme.dim.apply_to("└── matrix:"),
                        theme.dim.apply_to(labels.join(" | "))
                    ));
                }
            }
        }

        Ok(CommandResult::success())
    }
}
