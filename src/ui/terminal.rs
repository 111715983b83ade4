//! Interactive terminal UI.

use console::Term;
use std::io::Write;

use crate::runner::{RunEvent, RunResult};
use crate::shell::is_ci;

use super::{
    ConveyorTheme, EventFormatter, NonInteractiveUI, OutputMode, RunSpinners, UserInterface,
};

/// Interactive terminal UI implementation.
pub struct TerminalUI {
    term: Term,
    theme: ConveyorTheme,
    mode: OutputMode,
    formatter: EventFormatter,
    spinners: Option<RunSpinners>,
}

impl TerminalUI {
    /// Create a new terminal UI.
    ///
    /// Spinners are shown only when `animate` is set, stdout is a terminal,
    /// and we are not in CI.
    pub fn new(mode: OutputMode, animate: bool) -> Self {
        let term = Term::stdout();
        let theme = ConveyorTheme::detect();
        let spinners = (animate && mode.shows_spinners() && term.is_term() && !is_ci())
            .then(RunSpinners::new);

        Self {
            term,
            formatter: EventFormatter::new(theme.clone()),
            theme,
            mode,
            spinners,
        }
    }

    /// Whether run spinners are showing.
    pub fn is_animated(&self) -> bool {
        self.spinners.is_some()
    }

    fn line(&mut self, line: &str) {
        match &self.spinners {
            Some(spinners) => spinners.println(line),
            None => {
                writeln!(self.term, "{}", line).ok();
            }
        }
    }
}

impl UserInterface for TerminalUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            self.line(msg);
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            let line = self.theme.format_success(msg);
            self.line(&line);
        }
    }

    fn warning(&mut self, msg: &str) {
        if self.mode.shows_status() {
            let line = self.theme.format_warning(msg);
            self.line(&line);
        }
    }

    fn error(&mut self, msg: &str) {
        let line = self.theme.format_error(msg);
        self.line(&line);
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            let line = format!("\n{}\n", self.theme.format_header(title));
            self.line(&line);
        }
    }

    fn on_event(&mut self, event: &RunEvent) {
        for line in self.formatter.format(event, self.mode) {
            self.line(&line);
        }

        let Some(spinners) = &mut self.spinners else {
            return;
        };
        match event {
            RunEvent::RunStarted { run_id, name, .. } => spinners.start(run_id, name),
            RunEvent::StepStarted { run_id, step, .. } => {
                let name = self.formatter.name_of(run_id);
                spinners.set_message(run_id, &format!("{} · {}", name, step));
            }
            RunEvent::RunFinished { result } => spinners.finish(&result.run_id),
            _ => {}
        }
    }

    fn show_summary(&mut self, results: &[RunResult]) {
        if let Some(spinners) = &mut self.spinners {
            spinners.clear();
        }
        if !self.mode.shows_status() || results.is_empty() {
            return;
        }
        let lines = self.formatter.summary(results);
        writeln!(self.term).ok();
        for line in lines {
            writeln!(self.term, "{}", self.theme.highlight.apply_to(line)).ok();
        }
    }

    fn is_interactive(&self) -> bool {
        self.term.is_term()
    }

    fn set_output_mode(&mut self, mode: OutputMode) {
        self.mode = mode;
        if !mode.shows_spinners() {
            if let Some(mut spinners) = self.spinners.take() {
                spinners.clear();
            }
        }
    }
}

/// Create the UI for the current environment.
pub fn create_ui(
    interactive: bool,
    mode: OutputMode,
    animate: bool,
) -> Box<dyn UserInterface> {
    if interactive {
        Box::new(TerminalUI::new(mode, animate))
    } else {
        Box::new(NonInteractiveUI::new(mode))
    }
}
