//! Cross-process group leases.
//!
//! `leases.json` in the state directory records which run currently owns
//! each group. Every conveyor process sharing a state directory claims a
//! lease on admission, so a newer run in another process can supersede an
//! older one here. Read-modify-write cycles are serialized with a lock
//! file created with `create_new`.

use crate::error::{ConveyorError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::lock::{write_atomic, FileLock};

/// File name of the ledger inside the state directory.
pub const LEASE_FILE: &str = "leases.json";

const LOCK_FILE: &str = "leases.lock";

/// Ownership record for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    /// Run holding the group.
    pub run_id: String,
    /// Process that admitted the run.
    pub pid: u32,
    /// When the lease was taken.
    pub acquired_at: DateTime<Utc>,
}

impl Lease {
    /// Whether the process that took the lease still exists.
    pub fn owner_alive(&self) -> bool {
        self.pid == std::process::id() || process_alive(self.pid)
    }
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    // SAFETY: kill(2) with signal 0 only checks that the pid exists.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LeaseFile {
    #[serde(default)]
    leases: BTreeMap<String, Lease>,
}

/// Group lease ledger shared between processes.
#[derive(Debug, Clone)]
pub struct LeaseLedger {
    path: PathBuf,
    lock_path: PathBuf,
}

impl LeaseLedger {
    /// Ledger inside `state_dir`.
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(LEASE_FILE),
            lock_path: state_dir.join(LOCK_FILE),
        }
    }

    /// Path of the ledger file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Make `run_id` the owner of `group`.
    ///
    /// Returns the previous lease if a different run of a live process
    /// held it. Leases left by dead processes are taken over silently.
    pub fn claim(&self, group: &str, run_id: &str) -> Result<Option<Lease>> {
        self.update(|file| {
            let lease = Lease {
                run_id: run_id.to_string(),
                pid: std::process::id(),
                acquired_at: Utc::now(),
            };
            let previous = file.leases.insert(group.to_string(), lease);
            if let Some(p) = previous.as_ref().filter(|p| !p.owner_alive()) {
                debug!(group, "Dropping lease of exited process {}", p.pid);
            }
            Ok(previous.filter(|p| p.run_id != run_id && p.owner_alive()))
        })
    }

    /// Drop the lease on `group` if `run_id` still owns it.
    pub fn release(&self, group: &str, run_id: &str) -> Result<bool> {
        self.update(|file| {
            let owned = file
                .leases
                .get(group)
                .is_some_and(|lease| lease.run_id == run_id);
            if owned {
                file.leases.remove(group);
            }
            Ok(owned)
        })
    }

    /// Current owner of `group`.
    pub fn owner(&self, group: &str) -> Result<Option<Lease>> {
        Ok(self.read()?.leases.remove(group))
    }

    /// All current leases.
    pub fn snapshot(&self) -> Result<BTreeMap<String, Lease>> {
        Ok(self.read()?.leases)
    }

    fn read(&self) -> Result<LeaseFile> {
        match fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| ConveyorError::StateError {
                path: self.path.clone(),
                message: format!("Failed to parse lease ledger: {}", e),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(LeaseFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn update<T>(&self, f: impl FnOnce(&mut LeaseFile) -> Result<T>) -> Result<T> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let _lock = FileLock::acquire(&self.lock_path);
        let mut file = self.read()?;
        let value = f(&mut file)?;

        let content = serde_json::to_string_pretty(&file)?;
        write_atomic(&self.path, &content)?;

        Ok(value)
    }
}
