//! Comment posting for `comment:` steps.
//!
//! Comments are appended to a per-group Markdown file that an outer system
//! may publish. The [`CommentSink`] trait is the seam; tests and embedders
//! can provide their own.

use crate::error::Result;
use crate::state::{CommentLedger, FileLock};
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// What happened to a posted comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentDelivery {
    /// The message was written.
    Posted,
    /// The same message was already posted for the group.
    AlreadyPosted,
}

/// Destination for comment steps.
pub trait CommentSink: Send + Sync {
    /// Post `message` for `group`.
    ///
    /// With `allow_repeats` false, a message already posted for the group
    /// is not written again.
    fn post(&self, group: &str, message: &str, allow_repeats: bool) -> Result<CommentDelivery>;
}

/// Appends comments to `<comments_dir>/<group-slug>.md`.
pub struct FileCommentSink {
    comments_dir: PathBuf,
    ledger_path: PathBuf,
    lock_path: PathBuf,
    // Serializes ledger read-modify-write between runs of this process.
    lock: Mutex<()>,
}

impl FileCommentSink {
    /// Create a sink writing into `comments_dir`, tracking posted messages
    /// in the ledger under `state_dir`.
    pub fn new(comments_dir: impl Into<PathBuf>, state_dir: &Path) -> Self {
        Self {
            comments_dir: comments_dir.into(),
            ledger_path: CommentLedger::path(state_dir),
            lock_path: CommentLedger::lock_path(state_dir),
            lock: Mutex::new(()),
        }
    }

    /// File the comments for `group` are appended to.
    pub fn comment_file(&self, group: &str) -> PathBuf {
        self.comments_dir.join(format!("{}.md", group_slug(group)))
    }
}

impl CommentSink for FileCommentSink {
    fn post(&self, group: &str, message: &str, allow_repeats: bool) -> Result<CommentDelivery> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Other processes sharing the state directory.
        let _file_lock = FileLock::acquire(&self.lock_path);

        let mut ledger = CommentLedger::load(&self.ledger_path)?;
        if !allow_repeats && ledger.contains(group, message) {
            debug!(group, "Comment already posted, not repeating");
            return Ok(CommentDelivery::AlreadyPosted);
        }

        fs::create_dir_all(&self.comments_dir)?;
        let path = self.comment_file(group);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "<!-- {} -->", Utc::now().to_rfc3339())?;
        writeln!(file, "{}", message.trim_end())?;
        writeln!(file)?;

        ledger.record(group, message);
        ledger.save(&self.ledger_path)?;

        debug!(group, path = %path.display(), "Comment posted");
        Ok(CommentDelivery::Posted)
    }
}

/// File-name-safe form of a group key.
pub fn group_slug(group: &str) -> String {
    let mut slug = String::with_capacity(group.len());
    for c in group.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let slug = slug.trim_matches(|c| c == '-' || c == '.').to_string();
    if slug.is_empty() {
        "group".to_string()
    } else {
        slug
    }
}
