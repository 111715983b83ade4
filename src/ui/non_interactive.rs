//! Non-interactive UI for CI and piped output.

use crate::runner::{RunEvent, RunResult};

use super::{ConveyorTheme, EventFormatter, OutputMode, UserInterface};

/// UI implementation for non-interactive mode.
///
/// Plain lines only: no spinners, no colors. Errors and warnings go to
/// stderr.
pub struct NonInteractiveUI {
    mode: OutputMode,
    formatter: EventFormatter,
}

impl NonInteractiveUI {
    /// Create a new non-interactive UI.
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            formatter: EventFormatter::new(ConveyorTheme::plain()),
        }
    }
}

impl UserInterface for NonInteractiveUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("{}", msg);
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("✓ {}", msg);
        }
    }

    fn warning(&mut self, msg: &str) {
        if self.mode.shows_status() {
            eprintln!("⚠ {}", msg);
        }
    }

    fn error(&mut self, msg: &str) {
        eprintln!("✗ {}", msg);
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            println!("\n{}\n", title);
        }
    }

    fn on_event(&mut self, event: &RunEvent) {
        for line in self.formatter.format(event, self.mode) {
            println!("{}", line);
        }
    }

    fn show_summary(&mut self, results: &[RunResult]) {
        if !self.mode.shows_status() || results.is_empty() {
            return;
        }
        println!();
        for line in self.formatter.summary(results) {
            println!("{}", line);
        }
    }

    fn is_interactive(&self) -> bool {
        false
    }

    fn set_output_mode(&mut self, mode: OutputMode) {
        self.mode = mode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RunId;
    use crate::shell::OutputLine;

    #[test]
    fn is_never_interactive() {
        let ui = NonInteractiveUI::new(OutputMode::Normal);
        assert!(!ui.is_interactive());
        assert_eq!(ui.output_mode(), OutputMode::Normal);
    }

    #[test]
    fn renders_events_without_panic() {
        let mut ui = NonInteractiveUI::new(OutputMode::Verbose);
        let id = RunId::new();
        ui.on_event(&RunEvent::RunStarted {
            run_id: id.clone(),
            name: "ci / lint".to_string(),
            steps: 1,
        });
        ui.on_event(&RunEvent::StepOutput {
            run_id: id,
            line: OutputLine::Stdout("ok".to_string()),
        });
        ui.show_summary(&[]);
    }
}
