//! Ledger of posted comments.
//!
//! Comment steps with `allow-repeats: false` consult this ledger so the
//! same message is posted at most once per group, across runs and
//! processes. Messages are stored as SHA-256 hex digests. Callers hold the
//! [`FileLock`](super::FileLock) at [`CommentLedger::lock_path`] for the whole
//! load-check-save cycle.

use crate::error::{ConveyorError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::lock::write_atomic;

/// File name of the ledger inside the state directory.
pub const COMMENT_LEDGER_FILE: &str = "comments.json";

const COMMENT_LOCK_FILE: &str = "comments.lock";

/// Posted comment digests, keyed by group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentLedger {
    /// Group -> digests of messages already posted
    #[serde(default)]
    pub posted: BTreeMap<String, Vec<String>>,
}

impl CommentLedger {
    /// Path of the ledger for a state directory.
    pub fn path(state_dir: &Path) -> PathBuf {
        state_dir.join(COMMENT_LEDGER_FILE)
    }

    /// Path of the lock file guarding the ledger.
    pub fn lock_path(state_dir: &Path) -> PathBuf {
        state_dir.join(COMMENT_LOCK_FILE)
    }

    /// Load the ledger, or an empty one if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| ConveyorError::StateError {
            path: path.to_path_buf(),
            message: format!("Failed to parse comment ledger: {}", e),
        })
    }

    /// Write the ledger back to disk, replacing the file atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        write_atomic(path, &content)?;
        Ok(())
    }

    /// Whether `message` was already posted for `group`.
    pub fn contains(&self, group: &str, message: &str) -> bool {
        let digest = message_digest(message);
        self.posted
            .get(group)
            .is_some_and(|digests| digests.contains(&digest))
    }

    /// Record `message` for `group`. Returns false if it was already there.
    pub fn record(&mut self, group: &str, message: &str) -> bool {
        let digest = message_digest(message);
        let digests = self.posted.entry(group.to_string()).or_default();
        if digests.contains(&digest) {
            return false;
        }
        digests.push(digest);
        true
    }
}

/// SHA-256 hex digest of a message.
pub fn message_digest(message: &str) -> String {
    hex::encode(Sha256::digest(message.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn record_is_idempotent_per_group() {
        let mut ledger = CommentLedger::default();
        assert!(ledger.record("lint-42", "lint failed"));
        assert!(!ledger.record("lint-42", "lint failed"));
        assert!(ledger.record("lint-43", "lint failed"));
        assert!(ledger.contains("lint-42", "lint failed"));
        assert!(!ledger.contains("lint-42", "something else"));
    }

    #[test]
    fn digest_is_stable_hex() {
        let digest = message_digest("hello");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, message_digest("hello"));
        assert_ne!(digest, message_digest("hello!"));
    }

    #[test]
    fn save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = CommentLedger::path(&temp.path().join("state"));

        let mut ledger = CommentLedger::default();
        ledger.record("group", "message");
        ledger.save(&path).unwrap();

        let loaded = CommentLedger::load(&path).unwrap();
        assert!(loaded.contains("group", "message"));
    }

    #[test]
    fn load_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let ledger = CommentLedger::load(&temp.path().join("nope.json")).unwrap();
        assert!(ledger.posted.is_empty());
    }

    #[test]
    fn load_corrupt_file_is_state_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(COMMENT_LEDGER_FILE);
        fs::write(&path, "{not json").unwrap();
        let err = CommentLedger::load(&path).unwrap_err();
        assert!(matches!(err, ConveyorError::StateError { .. }));
    }
}
