//! Lock files and atomic writes for state shared between processes.
//!
//! Ledgers under the state directory are read, modified and written back
//! by every conveyor process using that directory. [`FileLock`] serializes
//! those cycles and [`write_atomic`] makes each write all-or-nothing.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, warn};

/// How long to wait for a busy lock before proceeding without it.
pub const LOCK_WAIT: Duration = Duration::from_secs(2);

const LOCK_RETRY: Duration = Duration::from_millis(10);
const STALE_LOCK: Duration = Duration::from_secs(30);

/// Lock file held for the duration of a ledger update.
///
/// Acquisition is best-effort: after [`LOCK_WAIT`] the update proceeds
/// without the lock. A lock older than 30 seconds is considered abandoned.
#[derive(Debug)]
pub struct FileLock {
    path: Option<PathBuf>,
}

impl FileLock {
    /// Create `path` exclusively, waiting while another holder has it.
    pub fn acquire(path: &Path) -> Self {
        let start = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(_) => {
                    return Self {
                        path: Some(path.to_path_buf()),
                    }
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(path) {
                        debug!("Removing stale lock {}", path.display());
                        let _ = fs::remove_file(path);
                        continue;
                    }
                    if start.elapsed() >= LOCK_WAIT {
                        warn!("Lock {} is busy, continuing without it", path.display());
                        return Self { path: None };
                    }
                    thread::sleep(LOCK_RETRY);
                }
                Err(e) => {
                    warn!("Cannot create lock {}: {}", path.display(), e);
                    return Self { path: None };
                }
            }
        }
    }

    /// Whether the lock file was actually created.
    pub fn is_held(&self) -> bool {
        self.path.is_some()
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Some(path) = &self.path {
            let _ = fs::remove_file(path);
        }
    }
}

fn is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_LOCK)
}

/// Write `content` to a sibling temp file, then rename it over `path`.
pub fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(format!(".{}.tmp", std::process::id()));
    let temp_path = path.with_file_name(temp_name);
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path)
}
