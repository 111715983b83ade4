//! History command implementation.
//!
//! The `conveyor history` command shows recorded invocations, most recent
//! first.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::args::HistoryArgs;
use crate::config::load_settings;
use crate::error::Result;
use crate::runner::RunStatus;
use crate::state::{HistoryStore, RunRecord};
use crate::steps::format_duration;
use crate::ui::theme::ConveyorTheme;
use crate::ui::{format_relative_time, UserInterface};

use super::dispatcher::{Command, CommandResult};
use super::display::{show_run_line, status_symbol};

const DEFAULT_LIMIT: usize = 10;

/// The history command implementation.
pub struct HistoryCommand {
    project_root: PathBuf,
    args: HistoryArgs,
}

impl HistoryCommand {
    /// Create a new history command.
    pub fn new(project_root: &Path, args: HistoryArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            args,
        }
    }

    /// Get the project root path.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Get the command arguments.
    pub fn args(&self) -> &HistoryArgs {
        &self.args
    }
}

impl HistoryCommand {
    /// Parse a duration string like "1h", "7d", "30m" into a chrono Duration.
    fn parse_since(s: &str) -> Option<chrono::Duration> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        let (num_str, unit) = s.split_at(s.len() - 1);
        let num: i64 = num_str.parse().ok()?;

        match unit {
            "m" => Some(chrono::Duration::minutes(num)),
            "h" => Some(chrono::Duration::hours(num)),
            "d" => Some(chrono::Duration::days(num)),
            "w" => Some(chrono::Duration::weeks(num)),
            _ => None,
        }
    }

    /// Format a single invocation line.
    fn format_record_line(record: &RunRecord) -> String {
        let count = record.runs.len();
        let noun = if count == 1 { "run" } else { "runs" };
        let failed = record.runs_with_status(RunStatus::Failed).count();
        let failed = if failed > 0 {
            format!(", {} failed", failed)
        } else {
            String::new()
        };

        format!(
            "{} {} ({}) - {} ({} {}{}, {})",
            status_symbol(record.status),
            format_relative_time(record.timestamp),
            record.timestamp.format("%Y-%m-%d %H:%M"),
            record.event,
            count,
            noun,
            failed,
            format_duration(Duration::from_millis(record.duration_ms))
        )
    }
}

impl Command for HistoryCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let settings = load_settings(&self.project_root)?;
        let store = HistoryStore::load(&self.project_root.join(&settings.state_dir))?;

        let limit = self.args.limit.unwrap_or(DEFAULT_LIMIT);
        let records = store.recent(limit);

        let cutoff = match self.args.since.as_deref() {
            Some(since) => match Self::parse_since(since) {
                Some(duration) => Some(chrono::Utc::now() - duration),
                None => {
                    ui.error(&format!(
                        "Invalid --since value '{}' (expected e.g. 30m, 1h, 7d, 2w)",
                        since
                    ));
                    return Ok(CommandResult::failure(1));
                }
            },
            None => None,
        };
        let filtered: Vec<&RunRecord> = records
            .iter()
            .filter(|r| cutoff.map_or(true, |c| r.timestamp >= c))
            .collect();

        if self.args.json {
            ui.message(&serde_json::to_string_pretty(&filtered)?);
            return Ok(CommandResult::success());
        }

        if filtered.is_empty() {
            ui.message("No run history for this project.");
            return Ok(CommandResult::success());
        }

        ui.show_header("Run History");

        let theme = ConveyorTheme::detect();
        for record in filtered {
            ui.message(&format!("  {}", Self::format_record_line(record)));
            if self.args.detail {
                for run in &record.runs {
                    show_run_line(ui, &theme, run);
                }
            }
        }

        Ok(CommandResult::success())
    }
}
