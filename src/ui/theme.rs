//! Visual theme and styling.

use console::Style;

use crate::runner::RunStatus;
use crate::steps::StepStatus;

/// Conveyor's visual theme.
#[derive(Debug, Clone)]
pub struct ConveyorTheme {
    /// Success messages (green).
    pub success: Style,
    /// Warnings and superseded runs (orange).
    pub warning: Style,
    /// Errors (red bold).
    pub error: Style,
    /// Running elements (magenta).
    pub info: Style,
    /// Secondary text.
    pub dim: Style,
    /// Important text (bold).
    pub highlight: Style,
    /// Headers (magenta bold).
    pub header: Style,
    /// Run labels in front of streamed lines.
    pub label: Style,
    /// Durations and timestamps.
    pub duration: Style,
    /// Commands shown in output.
    pub command: Style,
    /// Key labels in key-value displays.
    pub key: Style,
}

impl Default for ConveyorTheme {
    fn default() -> Self {
        Self::new()
    }
}

impl ConveyorTheme {
    /// Create the colored theme.
    pub fn new() -> Self {
        Self {
            success: Style::new().green(),
            warning: Style::new().color256(208),
            error: Style::new().red().bold(),
            info: Style::new().magenta(),
            dim: Style::new().dim(),
            highlight: Style::new().bold(),
            header: Style::new().bold().magenta(),
            label: Style::new().cyan(),
            duration: Style::new().dim(),
            command: Style::new().dim().italic(),
            key: Style::new().bold(),
        }
    }

    /// Create a theme without colors (for non-TTY or --no-color).
    pub fn plain() -> Self {
        Self {
            success: Style::new(),
            warning: Style::new(),
            error: Style::new(),
            info: Style::new(),
            dim: Style::new(),
            highlight: Style::new(),
            header: Style::new(),
            label: Style::new(),
            duration: Style::new(),
            command: Style::new(),
            key: Style::new(),
        }
    }

    /// Colored unless colors are disabled.
    pub fn detect() -> Self {
        if should_use_colors() {
            Self::new()
        } else {
            Self::plain()
        }
    }

    /// Format a success message (icon + text in green).
    pub fn format_success(&self, msg: &str) -> String {
        format!("{}", self.success.apply_to(format!("✓ {}", msg)))
    }

    /// Format a warning message (icon + text in orange).
    pub fn format_warning(&self, msg: &str) -> String {
        format!("{}", self.warning.apply_to(format!("⚠ {}", msg)))
    }

    /// Format an error message (icon + text in red bold).
    pub fn format_error(&self, msg: &str) -> String {
        format!("{}", self.error.apply_to(format!("✗ {}", msg)))
    }

    /// Format a header banner.
    pub fn format_header(&self, title: &str) -> String {
        format!("{} {}", self.header.apply_to("▶"), self.highlight.apply_to(title))
    }

    /// Style for a step status glyph.
    pub fn step_style(&self, status: StepStatus) -> &Style {
        match status {
            StepStatus::Succeeded => &self.success,
            StepStatus::Failed => &self.error,
            StepStatus::Cancelled => &self.warning,
            StepStatus::Running => &self.info,
            StepStatus::Pending | StepStatus::Skipped => &self.dim,
        }
    }

    /// Style for a run status.
    pub fn run_style(&self, status: RunStatus) -> &Style {
        match status {
            RunStatus::Succeeded => &self.success,
            RunStatus::Failed => &self.error,
            RunStatus::Cancelled => &self.warning,
            RunStatus::Running => &self.info,
            RunStatus::Pending => &self.dim,
        }
    }

    /// Glyph for a step status, styled.
    pub fn step_glyph(&self, status: StepStatus) -> String {
        format!("{}", self.step_style(status).apply_to(status.display_char()))
    }

    /// Glyph for a run status, styled.
    pub fn run_glyph(&self, status: RunStatus) -> String {
        format!("{}", self.run_style(status).apply_to(status.display_char()))
    }
}

/// Check if colors should be enabled.
pub fn should_use_colors() -> bool {
    // https://no-color.org/
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }

    console::Term::stdout().is_term()
}
