//! Conveyor CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use conveyor::cli::commands::{EXIT_CONFIG, EXIT_FAILURE};
use conveyor::cli::{Cli, CommandDispatcher, Commands};
use conveyor::config::find_project_root;
use conveyor::runner::install_interrupt_handler;
use conveyor::shell::is_ci;
use conveyor::ui::{create_ui, OutputMode};
use conveyor::ConveyorError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for logging.
///
/// Log level is controlled by:
/// 1. `--debug` flag sets level to DEBUG
/// 2. `RUST_LOG` environment variable (if set)
/// 3. Default is INFO
///
/// Logs go to stderr so JSON output on stdout stays parseable.
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("conveyor=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("conveyor=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn exit_code_for(error: &ConveyorError) -> i32 {
    match error {
        ConveyorError::ConfigNotFound { .. }
        | ConveyorError::ConfigParseError { .. }
        | ConveyorError::ConfigValidationError { .. }
        | ConveyorError::UnknownWorkflow { .. } => EXIT_CONFIG,
        _ => EXIT_FAILURE,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    tracing::debug!("Conveyor starting with args: {:?}", cli);

    // Determine output mode
    let output_mode = if cli.quiet {
        OutputMode::Quiet
    } else if cli.verbose {
        OutputMode::Verbose
    } else {
        OutputMode::Normal
    };

    // Handle --no-color
    if cli.no_color {
        std::env::set_var("NO_COLOR", "1");
    }

    // Determine project root
    let cwd = std::env::current_dir().unwrap_or_default();
    let project_root = cli
        .project
        .clone()
        .or_else(|| find_project_root(&cwd))
        .unwrap_or(cwd);

    // Check if non-interactive (CI mode or explicit flag)
    let (is_interactive, animate) = match &cli.command {
        Some(Commands::Run(args)) => (
            !args.non_interactive && !is_ci(),
            !args.no_interactive_output,
        ),
        _ => (!is_ci(), true),
    };

    // Runs are cancelled on Ctrl-C instead of being orphaned.
    if matches!(cli.command, None | Some(Commands::Run(_))) {
        install_interrupt_handler();
    }

    let mut ui = create_ui(is_interactive, output_mode, animate);

    let dispatcher = CommandDispatcher::new(project_root).with_config(cli.config.clone());

    match dispatcher.dispatch(&cli, ui.as_mut()) {
        Ok(result) => ExitCode::from(result.exit_code as u8),
        Err(e) => {
            ui.error(&format!("Error: {}", e));
            ExitCode::from(exit_code_for(&e) as u8)
        }
    }
}
