//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::path::{Path, PathBuf};

use crate::cli::args::{Cli, Commands, RunArgs};
use crate::config::{load_workflows, LoadedWorkflow};
use crate::error::{ConveyorError, Result};
use crate::ui::UserInterface;

/// Exit code when a run failed.
pub const EXIT_FAILURE: i32 = 1;

/// Exit code when configuration is missing or names an unknown workflow.
pub const EXIT_CONFIG: i32 = 2;

/// Exit code after an interrupt (128 + SIGINT).
pub const EXIT_INTERRUPTED: i32 = 130;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
pub trait Command {
    /// Execute the command.
    ///
    /// # Arguments
    ///
    /// * `ui` - User interface for displaying output
    ///
    /// # Returns
    ///
    /// A [`CommandResult`] indicating success/failure and exit code.
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Load workflows, reporting a missing configuration on the UI.
///
/// Returns `Ok(None)` after reporting when no workflow file exists.
pub(crate) fn load_or_report(
    project_root: &Path,
    config: Option<&Path>,
    ui: &mut dyn UserInterface,
) -> Result<Option<Vec<LoadedWorkflow>>> {
    match load_workflows(project_root, config) {
        Ok(workflows) => Ok(Some(workflows)),
        Err(ConveyorError::ConfigNotFound { path }) => {
            ui.error(&format!(
                "No workflows found at {}. Add a workflow file under .conveyor/workflows/.",
                path.display()
            ));
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    project_root: PathBuf,
    config: Option<PathBuf>,
}

impl CommandDispatcher {
    /// Create a new dispatcher for the given project root.
    pub fn new(project_root: PathBuf) -> Self {
        Self {
            project_root,
            config: None,
        }
    }

    /// Read a single workflow file instead of `.conveyor/workflows`.
    pub fn with_config(mut self, config: Option<PathBuf>) -> Self {
        self.config = config;
        self
    }

    /// Get the project root path.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Dispatch and execute a command.
    ///
    /// Routes the CLI subcommand to the appropriate command implementation
    /// and executes it.
    pub fn dispatch(&self, cli: &Cli, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let root = &self.project_root;
        let config = self.config.clone();

        match &cli.command {
            Some(Commands::Run(args)) => {
                super::run::RunCommand::new(root, config, args.clone()).execute(ui)
            }
            Some(Commands::List(args)) => {
                super::list::ListCommand::new(root, config, args.clone()).execute(ui)
            }
            Some(Commands::Validate(args)) => {
                super::validate::ValidateCommand::new(root, config, args.clone()).execute(ui)
            }
            Some(Commands::Last(args)) => {
                super::last::LastCommand::new(root, args.clone()).execute(ui)
            }
            Some(Commands::History(args)) => {
                super::history::HistoryCommand::new(root, args.clone()).execute(ui)
            }
            Some(Commands::Schema(_)) => super::schema::SchemaCommand::new().execute(ui),
            Some(Commands::Completions(args)) => {
                super::completions::CompletionsCommand::new(args.clone()).execute(ui)
            }
            None => super::run::RunCommand::new(root, config, RunArgs::default()).execute(ui),
        }
    }
}
