//! Shared display helpers for recorded runs.
//!
//! Used by `last` and `history --detail` to render [`RunResult`] values
//! consistently.

use crate::runner::{RunResult, RunStatus};
use crate::steps::{format_duration, StepStatus};
use crate::ui::theme::ConveyorTheme;
use crate::ui::UserInterface;

/// Bracketed symbol for a run status (non-TTY output).
pub fn status_symbol(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Succeeded => "[ok]",
        RunStatus::Failed => "[FAIL]",
        RunStatus::Cancelled => "[cancelled]",
        RunStatus::Running => "[running]",
        RunStatus::Pending => "[pending]",
    }
}

/// Print a run's status line, styled by severity.
pub fn show_run_line(ui: &mut dyn UserInterface, theme: &ConveyorTheme, result: &RunResult) {
    let mut line = format!(
        "  {} {} {}",
        theme.run_glyph(result.status),
        result.display_name(),
        theme.duration.apply_to(format_duration(result.duration()))
    );
    if let Some(failure) = &result.failure {
        line.push_str(&format!(" {}", theme.dim.apply_to(format!("- {}", failure))));
    }
    ui.message(&line);
}

/// Print a run's line followed by one line per step.
///
/// With `output`, captured stdout and stderr of each step are shown too.
pub fn show_run_detail(
    ui: &mut dyn UserInterface,
    theme: &ConveyorTheme,
    result: &RunResult,
    output: bool,
) {
    show_run_line(ui, theme, result);

    for outcome in &result.outcomes {
        let detail = match outcome.status {
            StepStatus::Succeeded => format!("({})", format_duration(outcome.duration)),
            _ => outcome
                .message
                .as_deref()
                .map(|m| format!("- {}", m))
                .unwrap_or_default(),
        };
        ui.message(&format!(
            "      {} {} {}",
            theme.step_glyph(outcome.status),
            outcome.name,
            theme.dim.apply_to(detail)
        ));

        if output {
            for line in outcome.stdout.lines().chain(outcome.stderr.lines()) {
                ui.message(&format!("        {}", theme.dim.apply_to(line)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{GroupKey, RunId, TriggerEvent};
    use crate::steps::StepOutcome;
    use crate::ui::MockUI;
    use chrono::Utc;
    use std::time::Duration;

    fn result(status: RunStatus) -> RunResult {
        let mut ok = StepOutcome::succeeded("checkout", "cloned\n");
        ok.duration = Duration::from_millis(20);
        RunResult {
            run_id: RunId::new(),
            workflow: "ci".to_string(),
            job: "test".to_string(),
            label: String::new(),
            group: GroupKey::new("ci-main", "test", ""),
            event: TriggerEvent::push("main"),
            status,
            outcomes: vec![ok, StepOutcome::failed("lint", "exited with code 1")],
            failure: Some("lint: exited with code 1".to_string()),
            started_at: Utc::now(),
            duration_ms: 1500,
        }
    }

    #[test]
    fn status_symbol_values() {
        assert_eq!(status_symbol(RunStatus::Succeeded), "[ok]");
        assert_eq!(status_symbol(RunStatus::Failed), "[FAIL]");
        assert_eq!(status_symbol(RunStatus::Cancelled), "[cancelled]");
    }

    #[test]
    fn run_line_includes_failure() {
        let mut ui = MockUI::new();
        show_run_line(&mut ui, &ConveyorTheme::plain(), &result(RunStatus::Failed));
        assert!(ui.has_message("✗ ci / test 1.5s - lint: exited with code 1"));
    }

    #[test]
    fn detail_lists_steps_and_output() {
        let mut ui = MockUI::new();
        let theme = ConveyorTheme::plain();
        show_run_detail(&mut ui, &theme, &result(RunStatus::Failed), false);
        assert!(ui.has_message("✓ checkout (20ms)"));
        assert!(ui.has_message("✗ lint - exited with code 1"));
        assert!(!ui.has_message("cloned"));

        ui.clear();
        show_run_detail(&mut ui, &theme, &result(RunStatus::Failed), true);
        assert!(ui.has_message("cloned"));
    }
}
