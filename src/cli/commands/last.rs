//! Last command implementation.
//!
//! The `conveyor last` command shows the most recent recorded invocation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::args::LastArgs;
use crate::config::load_settings;
use crate::error::Result;
use crate::state::HistoryStore;
use crate::steps::format_duration;
use crate::ui::theme::ConveyorTheme;
use crate::ui::{format_relative_time, UserInterface};

use super::dispatcher::{Command, CommandResult};
use super::display::show_run_detail;

/// The last command implementation.
pub struct LastCommand {
    project_root: PathBuf,
    args: LastArgs,
}

impl LastCommand {
    /// Create a new last command.
    pub fn new(project_root: &Path, args: LastArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            args,
        }
    }

    /// Get the project root path.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Get the command arguments.
    pub fn args(&self) -> &LastArgs {
        &self.args
    }
}

impl Command for LastCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let settings = load_settings(&self.project_root)?;
        let store = HistoryStore::load(&self.project_root.join(&settings.state_dir))?;

        let Some(last) = store.last() else {
            ui.message("No runs recorded for this project.");
            return Ok(CommandResult::success());
        };

        if self.args.json {
            ui.message(&serde_json::to_string_pretty(last)?);
            return Ok(CommandResult::success());
        }

        let theme = ConveyorTheme::detect();

        ui.message(&format!("\n  {}\n", theme.format_header("Last Run")));

        ui.message(&format!("  {}     {}", theme.key.apply_to("Event:"), last.event));
        if let Some(workflow) = &last.workflow {
            ui.message(&format!("  {}  {}", theme.key.apply_to("Workflow:"), workflow));
        }
        ui.message(&format!(
            "  {}      {} {}",
            theme.key.apply_to("When:"),
            format_relative_time(last.timestamp),
            theme.dim.apply_to(format!("({})", last.timestamp.format("%Y-%m-%d %H:%M:%S"))),
        ));
        ui.message(&format!(
            "  {}  {}",
            theme.key.apply_to("Duration:"),
            theme
                .duration
                .apply_to(format_duration(Duration::from_millis(last.duration_ms))),
        ));
        ui.message(&format!(
            "  {}    {} {}",
            theme.key.apply_to("Status:"),
            theme.run_glyph(last.status),
            last.status,
        ));

        if !last.runs.is_empty() {
            ui.message("");
            ui.message(&format!("  {}", theme.key.apply_to("Runs:")));
            for run in &last.runs {
                show_run_detail(ui, &theme, run, self.args.output);
            }
        }

        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{GroupKey, RunId, RunResult, RunStatus, TriggerEvent};
    use crate::state::RunHistoryBuilder;
    use crate::steps::StepOutcome;
    use crate::ui::MockUI;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record_run(temp: &TempDir, status: RunStatus, outcomes: Vec<StepOutcome>) {
        let state_dir = temp.path().join(".conveyor/state");
        let mut store = HistoryStore::load(&state_dir).unwrap();
        let event = TriggerEvent::pull_request(42, "dev");
        let mut history = RunHistoryBuilder::start(Some("ci"), &event);
        history.add(RunResult {
            run_id: RunId::new(),
            workflow: "ci".to_string(),
            job: "test".to_string(),
            label: String::new(),
            group: GroupKey::new("ci-42", "test", ""),
            event,
            status,
            failure: outcomes
                .iter()
                .find_map(|o| o.message.as_ref().map(|m| format!("{}: {}", o.name, m))),
            outcomes,
            started_at: Utc::now(),
            duration_ms: 1200,
        });
        store.record(history.finish(), 50);
        store.save(&state_dir).unwrap();
    }

    #[test]
    fn last_command_creation() {
        let temp = TempDir::new().unwrap();
        let cmd = LastCommand::new(temp.path(), LastArgs::default());
        assert_eq!(cmd.project_root(), temp.path());
        assert!(!cmd.args().json);
    }

    #[test]
    fn last_no_runs() {
        let temp = TempDir::new().unwrap();
        let mut ui = MockUI::new();
        let result = LastCommand::new(temp.path(), LastArgs::default())
            .execute(&mut ui)
            .unwrap();

        assert!(result.success);
        assert!(ui.has_message("No runs recorded"));
    }

    #[test]
    fn last_shows_event_status_and_runs() {
        let temp = TempDir::new().unwrap();
        record_run(
            &temp,
            RunStatus::Succeeded,
            vec![StepOutcome::succeeded("build", "compiled")],
        );

        let mut ui = MockUI::new();
        LastCommand::new(temp.path(), LastArgs::default())
            .execute(&mut ui)
            .unwrap();

        assert!(ui.has_message("Last Run"));
        assert!(ui.has_message("pull request #42 into dev"));
        assert!(ui.has_message("Workflow:"));
        assert!(ui.has_message("When:"));
        assert!(ui.has_message("succeeded"));
        assert!(ui.has_message("ci / test"));
        assert!(ui.has_message("build"));
        assert!(!ui.has_message("compiled"));
    }

    #[test]
    fn last_output_flag_shows_step_output() {
        let temp = TempDir::new().unwrap();
        record_run(
            &temp,
            RunStatus::Failed,
            vec![StepOutcome::failed("lint", "exited with code 1")],
        );

        let mut ui = MockUI::new();
        let args = LastArgs {
            output: true,
            ..LastArgs::default()
        };
        LastCommand::new(temp.path(), args).execute(&mut ui).unwrap();

        assert!(ui.has_message("failed"));
        assert!(ui.has_message("lint: exited with code 1"));
    }

    #[test]
    fn last_json() {
        let temp = TempDir::new().unwrap();
        record_run(&temp, RunStatus::Cancelled, Vec::new());

        let mut ui = MockUI::new();
        let args = LastArgs {
            json: true,
            ..LastArgs::default()
        };
        LastCommand::new(temp.path(), args).execute(&mut ui).unwrap();

        let value: serde_json::Value = serde_json::from_str(&ui.messages()[0]).unwrap();
        assert_eq!(value["status"], "cancelled");
        assert_eq!(value["runs"][0]["job"], "test");
    }
}
