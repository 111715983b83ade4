//! Shell command execution.

pub mod command;
pub mod platform;

pub use command::{
    execute, execute_controlled, CommandOptions, CommandResult, OutputLine, Termination,
};
pub use platform::{detect_shell, is_ci, ShellInfo, ShellType};
