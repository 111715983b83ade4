//! Step resolution and execution.
//!
//! - [`ResolvedStep`] - a step with expressions evaluated for one run
//! - [`StepAction`] - what the step does: shell, artifact or comment
//! - [`StepCondition`] - `success()`, `always()` or `failure()`
//! - [`execute_step`] - run one step and record a [`StepOutcome`]
//! - [`CommentSink`] - destination for comment steps
//!
//! # Example
//!
//! ```
//! use conveyor::secrets::OutputMasker;
//! use conveyor::steps::{
//!     execute_step, ExecutionOptions, FileCommentSink, ResolvedStep, StepContext, StepStatus,
//! };
//! use std::collections::HashMap;
//! use tempfile::TempDir;
//!
//! let temp = TempDir::new().unwrap();
//! let comments = FileCommentSink::new(temp.path().join("comments"), temp.path());
//! let env = HashMap::new();
//! let artifacts = temp.path().join("artifacts");
//! let ctx = StepContext {
//!     workspace: temp.path(),
//!     env: &env,
//!     run_id: "run_0_00",
//!     group: "lint-dev",
//!     artifacts_dir: &artifacts,
//!     comments: &comments,
//!     masker: &OutputMasker::new(),
//! };
//!
//! let step = ResolvedStep::shell("check", "black --check .");
//! let options = ExecutionOptions { dry_run: true, ..Default::default() };
//! let outcome = execute_step(&step, &ctx, &options, &mut |_| {}, &|| false).unwrap();
//!
//! assert_eq!(outcome.status, StepStatus::Succeeded);
//! assert_eq!(outcome.stdout, "Would run: black --check .");
//! ```

pub mod artifact;
pub mod comment;
pub mod executor;
pub mod resolved;

pub use artifact::{is_valid_artifact_name, upload_artifact};
pub use comment::{group_slug, CommentDelivery, CommentSink, FileCommentSink};
pub use executor::{
    execute_step, format_duration, ExecutionOptions, StepContext, StepOutcome, StepStatus,
};
pub use resolved::{ResolvedStep, StepAction, StepCondition};
