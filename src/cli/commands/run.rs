//! Run command implementation.
//!
//! The `conveyor run` command plans the runs an event triggers, executes
//! them in parallel through the concurrency gate, and records the
//! invocation in the history.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use tracing::{debug, warn};

use crate::cli::args::RunArgs;
use crate::config::{load_settings, validate, LoadedWorkflow, Settings};
use crate::error::{ConveyorError, Result};
use crate::runner::{
    interrupt_flag, plan, run_all, ConcurrencyGate, PlanOptions, Run, RunCoordinator, RunEvent,
    RunResult, RunStatus,
};
use crate::secrets::{OutputMasker, SecretMatcher};
use crate::state::{HistoryStore, LeaseLedger, RunHistoryBuilder};
use crate::steps::FileCommentSink;
use crate::ui::{OutputMode, UserInterface};

use super::dispatcher::{
    load_or_report, Command, CommandResult, EXIT_CONFIG, EXIT_FAILURE, EXIT_INTERRUPTED,
};

/// The run command implementation.
pub struct RunCommand {
    project_root: PathBuf,
    config: Option<PathBuf>,
    args: RunArgs,
}

impl RunCommand {
    /// Create a new run command.
    pub fn new(project_root: &Path, config: Option<PathBuf>, args: RunArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config,
            args,
        }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &RunArgs {
        &self.args
    }

    fn plan_options(&self, settings: &Settings) -> PlanOptions {
        PlanOptions {
            job: self.args.job.clone(),
            interactive_output: !self.args.no_interactive_output,
            job_timeout: Duration::from_secs(settings.job_timeout_minutes * 60),
            env: settings.env.clone(),
            inherited_env: std::env::vars().collect(),
        }
    }

    /// Workflows selected by `--workflow` and `--job`.
    fn select<'a>(
        &self,
        workflows: &'a [LoadedWorkflow],
        ui: &mut dyn UserInterface,
    ) -> Option<Vec<&'a LoadedWorkflow>> {
        let mut selected: Vec<_> = workflows.iter().collect();

        if let Some(name) = &self.args.workflow {
            selected.retain(|w| &w.name == name);
            if selected.is_empty() {
                let known: Vec<_> = workflows.iter().map(|w| w.name.as_str()).collect();
                ui.error(&format!(
                    "Unknown workflow: {} (available: {})",
                    name,
                    known.join(", ")
                ));
                return None;
            }
        }

        if let Some(job) = &self.args.job {
            selected.retain(|w| w.config.jobs.contains_key(job));
            if selected.is_empty() {
                ui.error(&format!("No workflow has a job named '{}'", job));
                return None;
            }
        }

        Some(selected)
    }

    fn masker(
        &self,
        settings: &Settings,
        runs: &[Run],
        inherited: &HashMap<String, String>,
    ) -> OutputMasker {
        let matcher = SecretMatcher::with_builtins_and_custom(&settings.secret_env);
        let mut env = inherited.clone();
        for run in runs {
            env.extend(run.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        OutputMasker::from_env(&env, &matcher)
    }

    fn record(
        &self,
        state_dir: &Path,
        settings: &Settings,
        builder: RunHistoryBuilder,
        ui: &mut dyn UserInterface,
    ) {
        let mut store = HistoryStore::load(state_dir).unwrap_or_else(|e| {
            warn!("Starting a fresh run history: {}", e);
            HistoryStore::default()
        });
        store.record(builder.finish(), settings.history_retention);
        if let Err(e) = store.save(state_dir) {
            ui.warning(&format!("Could not save run history: {}", e));
        }
    }
}

impl Command for RunCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let settings = load_settings(&self.project_root)?;

        // Apply config default_output when no CLI flag was explicitly set
        if ui.output_mode() == OutputMode::Normal {
            ui.set_output_mode(settings.default_output.into());
        }

        let workflows = match load_or_report(&self.project_root, self.config.as_deref(), ui) {
            Ok(Some(w)) => w,
            Ok(None) => return Ok(CommandResult::failure(EXIT_CONFIG)),
            Err(ConveyorError::ConfigParseError { path, message }) => {
                ui.error(&format!("Parse error in {}: {}", path.display(), message));
                return Ok(CommandResult::failure(EXIT_CONFIG));
            }
            Err(e) => return Err(e),
        };

        if let Err(e) = validate(&workflows) {
            ui.error(&e.to_string());
            return Ok(CommandResult::failure(EXIT_CONFIG));
        }

        let Some(selected) = self.select(&workflows, ui) else {
            return Ok(CommandResult::failure(EXIT_CONFIG));
        };

        let Some(event) = self.args.trigger_event() else {
            ui.error("A pull_request event needs --pr <NUMBER>");
            return Ok(CommandResult::failure(EXIT_CONFIG));
        };

        let options = self.plan_options(&settings);
        let mut runs = Vec::new();
        for workflow in selected {
            match plan(workflow, &event, &options) {
                Ok(planned) => runs.extend(planned),
                Err(e @ ConveyorError::ConfigValidationError { .. }) => {
                    ui.error(&e.to_string());
                    return Ok(CommandResult::failure(EXIT_CONFIG));
                }
                Err(e) => return Err(e),
            }
        }

        if runs.is_empty() {
            ui.message(&format!("No workflow is triggered by {}", event));
            return Ok(CommandResult::success());
        }

        let noun = if runs.len() == 1 { "run" } else { "runs" };
        ui.show_header(&format!("{} · {} {}", event, runs.len(), noun));
        if self.args.dry_run {
            ui.message("Running in dry-run mode - no commands will be executed");
        }

        let state_dir = self.project_root.join(&settings.state_dir);
        let artifacts_dir = self.project_root.join(&settings.artifacts_dir);
        let comments_dir = self.project_root.join(&settings.comments_dir);

        let masker = self.masker(&settings, &runs, &options.inherited_env);
        debug!("Masking {} secret values", masker.secret_count());

        let comments = Arc::new(FileCommentSink::new(comments_dir, &state_dir));
        let coordinator = RunCoordinator::new(&self.project_root, artifacts_dir, comments)
            .with_masker(masker)
            .with_dry_run(self.args.dry_run);
        let gate = if self.args.dry_run {
            ConcurrencyGate::new()
        } else {
            ConcurrencyGate::with_ledger(LeaseLedger::new(&state_dir))
        };
        let gate = gate.with_interrupt(interrupt_flag());
        let max_parallel = self.args.max_parallel.unwrap_or(settings.max_parallel);

        let mut history = RunHistoryBuilder::start(self.args.workflow.as_deref(), &event);

        let (tx, rx) = mpsc::channel::<RunEvent>();
        let coordinator = &coordinator;
        let gate = &gate;

        let results: Vec<RunResult> = thread::scope(|scope| {
            let worker =
                scope.spawn(move || run_all(runs, coordinator, gate, max_parallel, &tx));

            for progress in rx.iter() {
                ui.on_event(&progress);
            }

            worker
                .join()
                .map_err(|_| ConveyorError::Other(anyhow!("run executor panicked")))
        })?;

        ui.show_summary(&results);

        let failed = results.iter().any(|r| r.status == RunStatus::Failed);
        history.extend(results);
        if !self.args.dry_run {
            self.record(&state_dir, &settings, history, ui);
        }

        if gate.is_interrupted() {
            ui.warning("Interrupted, remaining runs were cancelled");
            Ok(CommandResult::failure(EXIT_INTERRUPTED))
        } else if failed {
            Ok(CommandResult::failure(EXIT_FAILURE))
        } else {
            Ok(CommandResult::success())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::MockUI;
    use std::fs;
    use tempfile::TempDir;

    fn project(workflows: &[(&str, &str)]) -> TempDir {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".conveyor").join("workflows");
        fs::create_dir_all(&dir).unwrap();
        for (name, content) in workflows {
            fs::write(dir.join(name), content).unwrap();
        }
        temp
    }

    const LINT: &str = r#"
name: lint
on: push
jobs:
  lint:
    steps:
      - name: checkout
        run: echo checkout
      - name: lint
        run: exit 1
      - name: upload
        if: always()
        run: echo uploading
"#;

    const BUILD: &str = r#"
name: build
on:
  push:
    branches: [main]
jobs:
  build:
    strategy:
      matrix:
        os: [linux, mac]
    steps:
      - run: echo building $MATRIX_OS
"#;

    #[test]
    fn failing_run_exits_one_and_records_history() {
        let temp = project(&[("lint.yml", LINT)]);
        let mut ui = MockUI::new();
        let cmd = RunCommand::new(temp.path(), None, RunArgs::default());

        let result = cmd.execute(&mut ui).unwrap();

        assert_eq!(result.exit_code, 1);
        let summary = &ui.summaries()[0];
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].status, RunStatus::Failed);
        assert_eq!(summary[0].failure.as_deref(), Some("lint: exited with code 1"));

        let store = HistoryStore::load(&temp.path().join(".conveyor/state")).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.last().unwrap().status, RunStatus::Failed);
    }

    #[test]
    fn matrix_runs_all_succeed() {
        let temp = project(&[("build.yml", BUILD)]);
        let mut ui = MockUI::new();
        let cmd = RunCommand::new(temp.path(), None, RunArgs::default());

        let result = cmd.execute(&mut ui).unwrap();

        assert!(result.success);
        assert_eq!(ui.summaries()[0].len(), 2);
        assert!(ui
            .events()
            .iter()
            .any(|e| matches!(e, RunEvent::RunStarted { name, .. } if name == "build / build (mac)")));
    }

    #[test]
    fn untriggered_event_runs_nothing() {
        let temp = project(&[("build.yml", BUILD)]);
        let mut ui = MockUI::new();
        let args = RunArgs {
            reference: "feature".to_string(),
            ..RunArgs::default()
        };

        let result = RunCommand::new(temp.path(), None, args).execute(&mut ui).unwrap();

        assert!(result.success);
        assert!(ui.has_message("No workflow is triggered"));
        assert!(ui.summaries().is_empty());
    }

    #[test]
    fn unknown_workflow_exits_two() {
        let temp = project(&[("lint.yml", LINT)]);
        let mut ui = MockUI::new();
        let args = RunArgs {
            workflow: Some("deploy".to_string()),
            ..RunArgs::default()
        };

        let result = RunCommand::new(temp.path(), None, args).execute(&mut ui).unwrap();

        assert_eq!(result.exit_code, 2);
        assert!(ui.has_error("Unknown workflow: deploy"));
    }

    #[test]
    fn missing_config_exits_two() {
        let temp = TempDir::new().unwrap();
        let mut ui = MockUI::new();
        let result = RunCommand::new(temp.path(), None, RunArgs::default())
            .execute(&mut ui)
            .unwrap();
        assert_eq!(result.exit_code, 2);
    }

    #[test]
    fn dry_run_executes_nothing_and_keeps_no_history() {
        let temp = project(&[("lint.yml", LINT)]);
        let mut ui = MockUI::new();
        let args = RunArgs {
            dry_run: true,
            ..RunArgs::default()
        };

        let result = RunCommand::new(temp.path(), None, args).execute(&mut ui).unwrap();

        assert!(result.success);
        assert!(ui.has_message("dry-run"));
        assert!(!temp.path().join(".conveyor/state/history.json").exists());
    }

    #[test]
    fn job_filter_selects_workflows() {
        let temp = project(&[("lint.yml", LINT), ("build.yml", BUILD)]);
        let mut ui = MockUI::new();
        let args = RunArgs {
            job: Some("build".to_string()),
            ..RunArgs::default()
        };

        let result = RunCommand::new(temp.path(), None, args).execute(&mut ui).unwrap();

        assert!(result.success);
        assert!(ui.summaries()[0].iter().all(|r| r.job == "build"));
    }
}
