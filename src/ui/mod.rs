//! Terminal output for run progress and command results.
//!
//! This module provides:
//! - [`UserInterface`] trait for UI abstraction
//! - [`TerminalUI`] for interactive terminals, with a spinner per active run
//! - [`NonInteractiveUI`] for CI and piped output
//! - [`MockUI`] for tests
//!
//! # Example
//!
//! ```
//! use conveyor::ui::{MockUI, UserInterface};
//!
//! let mut ui = MockUI::new();
//! ui.show_header("ci");
//! ui.success("All runs passed");
//! assert!(ui.has_success("passed"));
//! ```

pub mod mock;
pub mod non_interactive;
pub mod output;
pub mod progress;
pub mod spinner;
pub mod terminal;
pub mod theme;

pub use mock::MockUI;
pub use non_interactive::NonInteractiveUI;
pub use output::OutputMode;
pub use progress::{format_relative_time, EventFormatter};
pub use spinner::RunSpinners;
pub use terminal::{create_ui, TerminalUI};
pub use theme::{should_use_colors, ConveyorTheme};

use crate::runner::{RunEvent, RunResult};

/// Trait for user interface interactions.
///
/// Run events arrive from worker threads through a channel; the UI itself
/// is only touched from the thread draining that channel.
pub trait UserInterface {
    /// Get the current output mode.
    fn output_mode(&self) -> OutputMode;

    /// Display a message to the user.
    fn message(&mut self, msg: &str);

    /// Display a success message.
    fn success(&mut self, msg: &str);

    /// Display a warning message.
    fn warning(&mut self, msg: &str);

    /// Display an error message.
    fn error(&mut self, msg: &str);

    /// Show a header/banner.
    fn show_header(&mut self, title: &str);

    /// Render a run event.
    fn on_event(&mut self, event: &RunEvent);

    /// Show the closing summary of a batch of runs.
    fn show_summary(&mut self, results: &[RunResult]);

    /// Check if running in interactive mode.
    fn is_interactive(&self) -> bool;

    /// Change the output mode.
    fn set_output_mode(&mut self, mode: OutputMode);
}
