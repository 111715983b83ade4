//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::runner::TriggerEvent;

/// Conveyor - declarative CI run coordinator.
#[derive(Debug, Parser)]
#[command(name = "conveyor")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a single workflow file (overrides .conveyor/workflows)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to project root (overrides current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Stream step output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only show run results
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Plan and execute the runs an event triggers (default)
    Run(RunArgs),

    /// List workflows, triggers, jobs and matrix combinations
    List(ListArgs),

    /// Validate workflow files
    Validate(ValidateArgs),

    /// Show the most recent invocation
    Last(LastArgs),

    /// Show recorded invocations
    History(HistoryArgs),

    /// Print the JSON schema of workflow files
    Schema(SchemaArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Trigger event kind on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum EventArg {
    #[default]
    Push,
    #[value(name = "pull_request")]
    PullRequest,
}

/// Arguments for the `run` command.
#[derive(Debug, Clone, clap::Args)]
pub struct RunArgs {
    /// Only run this workflow
    #[arg(short, long)]
    pub workflow: Option<String>,

    /// Only run this job
    #[arg(short, long)]
    pub job: Option<String>,

    /// Event to simulate
    #[arg(long, value_enum, default_value_t = EventArg::Push)]
    pub event: EventArg,

    /// Branch or ref the event targets
    #[arg(long = "ref", env = "CONVEYOR_REF", default_value = "main")]
    pub reference: String,

    /// Pull request number (required for pull_request)
    #[arg(long, env = "CONVEYOR_PR", required_if_eq("event", "pull_request"))]
    pub pr: Option<u64>,

    /// Preview steps without executing
    #[arg(long)]
    pub dry_run: bool,

    /// Run with interactive-output off by default
    #[arg(long)]
    pub no_interactive_output: bool,

    /// Maximum concurrent runs
    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// Plain output, no spinners
    #[arg(long)]
    pub non_interactive: bool,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            workflow: None,
            job: None,
            event: EventArg::Push,
            reference: "main".to_string(),
            pr: None,
            dry_run: false,
            no_interactive_output: false,
            max_parallel: None,
            non_interactive: false,
        }
    }
}

impl RunArgs {
    /// The trigger event these arguments describe.
    pub fn trigger_event(&self) -> Option<TriggerEvent> {
        match self.event {
            EventArg::Push => Some(TriggerEvent::push(self.reference.as_str())),
            EventArg::PullRequest => self
                .pr
                .map(|number| TriggerEvent::pull_request(number, self.reference.as_str())),
        }
    }
}

/// Arguments for the `list` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ValidateArgs {
    /// Output errors as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `last` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct LastArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Include captured step output
    #[arg(long)]
    pub output: bool,
}

/// Arguments for the `history` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct HistoryArgs {
    /// Number of invocations to show
    #[arg(long)]
    pub limit: Option<usize>,

    /// Show invocations since duration (e.g., "1h", "7d", "30m")
    #[arg(long)]
    pub since: Option<String>,

    /// Show every run of each invocation
    #[arg(long)]
    pub detail: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `schema` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct SchemaArgs {}

/// Arguments for the `completions` command.
#[derive(Debug, Clone, clap::Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
