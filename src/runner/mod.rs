//! Run planning, admission, and execution.
//!
//! A workflow is turned into [`Run`]s by [`plan`], admitted through the
//! [`ConcurrencyGate`], and executed by the [`RunCoordinator`]. [`run_all`]
//! ties the three together for a batch of runs.

pub mod cancel;
pub mod coordinator;
pub mod events;
pub mod gate;
pub mod matrix;
pub mod parallel;
pub mod plan;
pub mod run;

pub use cancel::{install_interrupt_handler, interrupt_flag, CancelToken};
pub use coordinator::RunCoordinator;
pub use events::{EventSink, NullSink, RecordingSink, RunEvent};
pub use gate::{Admission, ConcurrencyGate, Ticket};
pub use matrix::{axes, expand, MatrixAxis, MatrixCombination};
pub use parallel::{run_all, LEASE_POLL_INTERVAL};
pub use plan::{is_triggered, plan, PlanOptions, DEFAULT_GROUP_TEMPLATE};
pub use run::{
    matrix_env_name, GroupKey, Run, RunId, RunParameters, RunResult, RunStatus, TriggerEvent,
    LATEST,
};
