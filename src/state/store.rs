//! Persistent run history.
//!
//! `history.json` in the state directory holds the most recent
//! [`RunRecord`]s, newest first, bounded by the configured retention.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ConveyorError, Result};
use crate::runner::RunResult;

use super::RunRecord;

/// File name of the history inside the state directory.
pub const HISTORY_FILE: &str = "history.json";

/// Persisted history of invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryStore {
    /// Schema version for migration.
    pub version: u32,

    /// Records, most recent first.
    #[serde(default)]
    pub records: Vec<RunRecord>,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            records: Vec::new(),
        }
    }
}

impl HistoryStore {
    /// Current schema version.
    pub const CURRENT_VERSION: u32 = 1;

    /// Default number of records kept.
    pub const DEFAULT_RETENTION: usize = 50;

    /// Path of the history file for a state directory.
    pub fn path(state_dir: &Path) -> PathBuf {
        state_dir.join(HISTORY_FILE)
    }

    /// Load history from `state_dir`, or an empty history if none exists.
    pub fn load(state_dir: &Path) -> Result<Self> {
        let path = Self::path(state_dir);

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| ConveyorError::StateError {
            path: path.clone(),
            message: format!("Failed to parse run history: {}", e),
        })
    }

    /// Save history using an atomic write.
    ///
    /// The file is written to a temp path and renamed over the old one, so
    /// a crash mid-write never leaves a truncated history behind.
    pub fn save(&self, state_dir: &Path) -> Result<()> {
        fs::create_dir_all(state_dir)?;

        let path = Self::path(state_dir);
        let content = serde_json::to_string_pretty(self)?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, &path)?;

        debug!("Saved {} history records to {}", self.records.len(), path.display());
        Ok(())
    }

    /// Record an invocation, keeping at most `retention` records.
    pub fn record(&mut self, record: RunRecord, retention: usize) {
        self.records.insert(0, record);
        self.prune(retention);
    }

    /// Most recent record.
    pub fn last(&self) -> Option<&RunRecord> {
        self.records.first()
    }

    /// Up to `limit` records, most recent first.
    pub fn recent(&self, limit: usize) -> &[RunRecord] {
        let len = self.records.len().min(limit);
        &self.records[..len]
    }

    /// Find a run by id across all records.
    pub fn find_run(&self, run_id: &str) -> Option<&RunResult> {
        self.records
            .iter()
            .flat_map(|record| record.runs.iter())
            .find(|run| run.run_id.to_string() == run_id)
    }

    /// Drop records beyond `keep`.
    pub fn prune(&mut self, keep: usize) {
        if self.records.len() > keep {
            self.records.truncate(keep);
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
