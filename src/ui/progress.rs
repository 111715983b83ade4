//! Rendering of run events as display lines.
//!
//! Runs execute in parallel, so every streamed line is prefixed with the
//! name of the run it belongs to.

use std::collections::HashMap;

use crate::runner::{RunEvent, RunId, RunResult, RunStatus};
use crate::steps::format_duration;

use super::{ConveyorTheme, OutputMode};

/// Turns [`RunEvent`]s into lines for a given output mode.
#[derive(Debug, Default)]
pub struct EventFormatter {
    theme: ConveyorTheme,
    names: HashMap<RunId, String>,
}

impl EventFormatter {
    pub fn new(theme: ConveyorTheme) -> Self {
        Self {
            theme,
            names: HashMap::new(),
        }
    }

    /// Display name of a started run, or its id.
    pub fn name_of(&self, run_id: &RunId) -> String {
        self.names
            .get(run_id)
            .cloned()
            .unwrap_or_else(|| run_id.to_string())
    }

    fn prefix(&self, run_id: &RunId) -> String {
        format!(
            "{}",
            self.theme.label.apply_to(format!("[{}]", self.name_of(run_id)))
        )
    }

    /// Lines to print for `event`.
    pub fn format(&mut self, event: &RunEvent, mode: OutputMode) -> Vec<String> {
        let mut lines = Vec::new();
        match event {
            RunEvent::RunStarted {
                run_id,
                name,
                steps,
            } => {
                self.names.insert(run_id.clone(), name.clone());
                if mode.shows_steps() {
                    let noun = if *steps == 1 { "step" } else { "steps" };
                    lines.push(format!(
                        "{} {}",
                        self.prefix(run_id),
                        self.theme.dim.apply_to(format!("started, {} {}", steps, noun))
                    ));
                }
            }
            RunEvent::RunSuperseded { run_id, previous } => {
                if mode.shows_status() {
                    lines.push(
                        self.theme
                            .format_warning(&format!("{} supersedes {}", run_id, previous)),
                    );
                }
            }
            RunEvent::StepStarted { run_id, step, .. } => {
                if mode.shows_command_output() {
                    lines.push(format!(
                        "{} {}",
                        self.prefix(run_id),
                        self.theme.info.apply_to(format!("◉ {}", step))
                    ));
                }
            }
            RunEvent::StepOutput { run_id, line } => {
                if mode.shows_command_output() {
                    lines.push(format!("{} {}", self.prefix(run_id), line.text().trim_end()));
                }
            }
            RunEvent::StepFinished { run_id, outcome } => {
                if mode.shows_steps() {
                    lines.push(format!(
                        "{} {}",
                        self.prefix(run_id),
                        self.theme
                            .step_style(outcome.status)
                            .apply_to(outcome.summary_line())
                    ));
                }
            }
            RunEvent::RunFinished { result } => {
                if mode.shows_status() {
                    lines.push(self.result_line(result));
                }
                self.names.remove(&result.run_id);
            }
        }
        lines
    }

    /// One line describing a finished run.
    pub fn result_line(&self, result: &RunResult) -> String {
        let mut line = format!(
            "{} {} {} in {}",
            result.status.display_char(),
            result.display_name(),
            result.status,
            format_duration(result.duration())
        );
        if let Some(failure) = &result.failure {
            line.push_str(&format!(" ({})", failure));
        }
        format!("{}", self.theme.run_style(result.status).apply_to(line))
    }

    /// Closing summary for a batch of runs.
    pub fn summary(&self, results: &[RunResult]) -> Vec<String> {
        let count = |status: RunStatus| results.iter().filter(|r| r.status == status).count();
        let noun = if results.len() == 1 { "run" } else { "runs" };

        vec![format!(
            "{} {}: {} succeeded, {} failed, {} cancelled",
            results.len(),
            noun,
            count(RunStatus::Succeeded),
            count(RunStatus::Failed),
            count(RunStatus::Cancelled)
        )]
    }
}

/// Format a timestamp as a relative time string (e.g., "2 minutes ago").
pub fn format_relative_time(timestamp: chrono::DateTime<chrono::Utc>) -> String {
    let seconds = chrono::Utc::now()
        .signed_duration_since(timestamp)
        .num_seconds();

    if seconds < 60 {
        return "just now".to_string();
    }

    let minutes = seconds / 60;
    if minutes < 60 {
        return if minutes == 1 {
            "1 minute ago".to_string()
        } else {
            format!("{} minutes ago", minutes)
        };
    }

    let hours = minutes / 60;
    if hours < 24 {
        return if hours == 1 {
            "1 hour ago".to_string()
        } else {
            format!("{} hours ago", hours)
        };
    }

    let days = hours / 24;
    if days < 30 {
        return if days == 1 {
            "yesterday".to_string()
        } else {
            format!("{} days ago", days)
        };
    }

    let months = days / 30;
    if months < 12 {
        return if months == 1 {
            "1 month ago".to_string()
        } else {
            format!("{} months ago", months)
        };
    }

    let years = months / 12;
    if years == 1 {
        "1 year ago".to_string()
    } else {
        format!("{} years ago", years)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{GroupKey, TriggerEvent};
    use crate::shell::OutputLine;
    use crate::steps::StepOutcome;

    fn formatter() -> EventFormatter {
        EventFormatter::new(ConveyorTheme::plain())
    }

    fn started(f: &mut EventFormatter, id: &RunId) {
        f.format(
            &RunEvent::RunStarted {
                run_id: id.clone(),
                name: "ci / test (os: linux)".to_string(),
                steps: 2,
            },
            OutputMode::Silent,
        );
    }

    fn result(id: &RunId, status: RunStatus, failure: Option<&str>) -> RunResult {
        RunResult {
            run_id: id.clone(),
            workflow: "ci".to_string(),
            job: "test".to_string(),
            label: "os: linux".to_string(),
            group: GroupKey::new("ci-dev", "test", "os: linux"),
            event: TriggerEvent::push("dev"),
            status,
            outcomes: Vec::new(),
            failure: failure.map(str::to_string),
            started_at: chrono::Utc::now(),
            duration_ms: 1500,
        }
    }

    #[test]
    fn output_lines_carry_run_label_in_verbose() {
        let mut f = formatter();
        let id = RunId::new();
        started(&mut f, &id);

        let lines = f.format(
            &RunEvent::StepOutput {
                run_id: id.clone(),
                line: OutputLine::Stdout("compiling\n".to_string()),
            },
            OutputMode::Verbose,
        );
        assert_eq!(lines, vec!["[ci / test (os: linux)] compiling"]);
    }

    #[test]
    fn output_lines_hidden_in_normal() {
        let mut f = formatter();
        let id = RunId::new();
        let lines = f.format(
            &RunEvent::StepOutput {
                run_id: id,
                line: OutputLine::Stderr("noise".to_string()),
            },
            OutputMode::Normal,
        );
        assert!(lines.is_empty());
    }

    #[test]
    fn step_finished_uses_summary_line() {
        let mut f = formatter();
        let id = RunId::new();
        started(&mut f, &id);

        let lines = f.format(
            &RunEvent::StepFinished {
                run_id: id.clone(),
                outcome: StepOutcome::failed("lint", "exited with code 1"),
            },
            OutputMode::Normal,
        );
        assert_eq!(lines, vec!["[ci / test (os: linux)] ✗ lint - exited with code 1"]);
    }

    #[test]
    fn run_finished_includes_failure() {
        let mut f = formatter();
        let id = RunId::new();
        let lines = f.format(
            &RunEvent::RunFinished {
                result: result(&id, RunStatus::Failed, Some("lint: exited with code 1")),
            },
            OutputMode::Quiet,
        );
        assert_eq!(
            lines,
            vec!["✗ ci / test (os: linux) failed in 1.5s (lint: exited with code 1)"]
        );
    }

    #[test]
    fn unknown_run_falls_back_to_id() {
        let f = formatter();
        let id = RunId::new();
        assert_eq!(f.name_of(&id), id.to_string());
    }

    #[test]
    fn superseded_is_a_warning() {
        let mut f = formatter();
        let lines = f.format(
            &RunEvent::RunSuperseded {
                run_id: RunId::new(),
                previous: "run_1_00".to_string(),
            },
            OutputMode::Quiet,
        );
        assert!(lines[0].starts_with("⚠ "));
        assert!(lines[0].ends_with("supersedes run_1_00"));
    }

    #[test]
    fn summary_counts_statuses() {
        let f = formatter();
        let results = vec![
            result(&RunId::new(), RunStatus::Succeeded, None),
            result(&RunId::new(), RunStatus::Failed, None),
            result(&RunId::new(), RunStatus::Cancelled, None),
        ];
        assert_eq!(
            f.summary(&results),
            vec!["3 runs: 1 succeeded, 1 failed, 1 cancelled"]
        );
    }

    #[test]
    fn relative_time_minutes() {
        let ts = chrono::Utc::now() - chrono::Duration::minutes(5);
        assert_eq!(format_relative_time(ts), "5 minutes ago");
    }

    #[test]
    fn relative_time_future_shows_just_now() {
        let ts = chrono::Utc::now() + chrono::Duration::hours(1);
        assert_eq!(format_relative_time(ts), "just now");
    }

    #[test]
    fn relative_time_yesterday() {
        let ts = chrono::Utc::now() - chrono::Duration::days(1);
        assert_eq!(format_relative_time(ts), "yesterday");
    }
}
