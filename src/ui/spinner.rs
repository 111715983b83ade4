//! Progress spinners, one per active run.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::time::Duration;

use crate::runner::RunId;

/// Spinners for runs in flight.
///
/// Lines printed through [`RunSpinners::println`] appear above the
/// spinners instead of tearing them.
pub struct RunSpinners {
    multi: MultiProgress,
    bars: HashMap<RunId, ProgressBar>,
    style: ProgressStyle,
}

impl RunSpinners {
    /// Spinners drawn to stderr.
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// Spinners that draw nothing.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let style = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
            .template("{spinner:.magenta} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: HashMap::new(),
            style,
        }
    }

    /// Start a spinner for `run_id`.
    pub fn start(&mut self, run_id: &RunId, message: &str) {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(self.style.clone());
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        self.bars.insert(run_id.clone(), bar);
    }

    /// Update the message of `run_id`'s spinner.
    pub fn set_message(&self, run_id: &RunId, message: &str) {
        if let Some(bar) = self.bars.get(run_id) {
            bar.set_message(message.to_string());
        }
    }

    /// Remove `run_id`'s spinner.
    pub fn finish(&mut self, run_id: &RunId) {
        if let Some(bar) = self.bars.remove(run_id) {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
    }

    /// Print a line above the spinners.
    pub fn println(&self, line: &str) {
        if self.multi.println(line).is_err() {
            eprintln!("{}", line);
        }
    }

    /// Number of spinners showing.
    pub fn active(&self) -> usize {
        self.bars.len()
    }

    /// Remove every spinner.
    pub fn clear(&mut self) {
        for (_, bar) in self.bars.drain() {
            bar.finish_and_clear();
        }
        let _ = self.multi.clear();
    }
}

impl Default for RunSpinners {
    fn default() -> Self {
        Self::new()
    }
}
