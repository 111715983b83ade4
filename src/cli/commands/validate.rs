//! Validate command implementation.
//!
//! The `conveyor validate` command checks every workflow file and reports
//! all problems found, not just the first.

use std::path::{Path, PathBuf};

use serde_json::json;

use crate::cli::args::ValidateArgs;
use crate::config::{validate_workflows, ValidationError};
use crate::error::{ConveyorError, Result};
use crate::ui::UserInterface;

use super::dispatcher::{load_or_report, Command, CommandResult, EXIT_CONFIG, EXIT_FAILURE};

/// The validate command implementation.
pub struct ValidateCommand {
    project_root: PathBuf,
    config: Option<PathBuf>,
    args: ValidateArgs,
}

impl ValidateCommand {
    /// Create a new validate command.
    pub fn new(project_root: &Path, config: Option<PathBuf>, args: ValidateArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config,
            args,
        }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &ValidateArgs {
        &self.args
    }

    fn report_json(&self, ui: &mut dyn UserInterface, errors: &[ValidationError]) -> Result<()> {
        let list: Vec<_> = errors
            .iter()
            .map(|e| {
                json!({
                    "rule": e.rule,
                    "workflow": e.workflow,
                    "job": e.job,
                    "message": e.message,
                })
            })
            .collect();
        ui.message(&serde_json::to_string_pretty(&list)?);
        Ok(())
    }
}

impl Command for ValidateCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let workflows = match load_or_report(&self.project_root, self.config.as_deref(), ui) {
            Ok(Some(w)) => w,
            Ok(None) => return Ok(CommandResult::failure(EXIT_CONFIG)),
            Err(ConveyorError::ConfigParseError { path, message }) => {
                ui.error(&format!("Parse error in {}: {}", path.display(), message));
                return Ok(CommandResult::failure(EXIT_FAILURE));
            }
            Err(e) => return Err(e),
        };

        let errors = validate_workflows(&workflows);

        if self.args.json {
            self.report_json(ui, &errors)?;
        } else if errors.is_empty() {
            let noun = if workflows.len() == 1 { "workflow" } else { "workflows" };
            ui.success(&format!("{} {} valid", workflows.len(), noun));
        } else {
            for error in &errors {
                let location = match &error.job {
                    Some(job) => format!("{}.{}", error.workflow, job),
                    None => error.workflow.clone(),
                };
                ui.error(&format!("[{}] {}: {}", error.rule, location, error.message));
            }
            let noun = if errors.len() == 1 { "error" } else { "errors" };
            ui.message(&format!("\n{} {} found", errors.len(), noun));
        }

        if errors.is_empty() {
            Ok(CommandResult::success())
        } else {
            Ok(CommandResult::failure(EXIT_FAILURE))
        }
    }
}
