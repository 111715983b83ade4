//! State management for run history and cross-run coordination.
//!
//! Everything lives as JSON under the project's state directory
//! (`.conveyor/state` by default): run history, posted comment digests,
//! and the group lease ledger.

pub mod comments;
pub mod history;
pub mod lease;
pub mod lock;
pub mod store;

pub use comments::{message_digest, CommentLedger, COMMENT_LEDGER_FILE};
pub use history::{overall_status, RunHistoryBuilder, RunRecord};
pub use lease::{Lease, LeaseLedger, LEASE_FILE};
pub use lock::{write_atomic, FileLock};
pub use store::{HistoryStore, HISTORY_FILE};
