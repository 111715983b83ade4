//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! # Architecture
//!
//! Commands are dispatched via [`CommandDispatcher`], which routes CLI
//! subcommands to their implementations. This allows:
//! - Single binary with subcommands (`conveyor run`, `conveyor list`)
//! - Shared workflow loading and error reporting
//! - Consistent global flag handling

pub mod completions;
pub mod dispatcher;
pub mod display;
pub mod history;
pub mod last;
pub mod list;
pub mod run;
pub mod schema;
pub mod validate;

pub use dispatcher::{
    Command, CommandDispatcher, CommandResult, EXIT_CONFIG, EXIT_FAILURE, EXIT_INTERRUPTED,
};
