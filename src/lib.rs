//! Conveyor - declarative CI run coordinator.
//!
//! Conveyor reads workflow files from `.conveyor/workflows/`, plans the
//! runs a push or pull request event triggers, and executes them in
//! parallel. Runs sharing a concurrency group supersede each other: when
//! a newer run for the same pull request starts, the older one is
//! cancelled.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Workflow loading, parsing, expressions and validation
//! - [`error`] - Error types and result aliases
//! - [`runner`] - Planning, matrix expansion, the concurrency gate and run execution
//! - [`secrets`] - Secret detection and output masking
//! - [`shell`] - Shell command execution
//! - [`state`] - Run history, comment ledger and cross-process leases
//! - [`steps`] - Step resolution and execution
//! - [`ui`] - Spinners, progress rendering and terminal output
//!
//! # Example
//!
//! ```
//! use conveyor::config::{resolve_string, ExpressionContext};
//!
//! // Resolve the default concurrency group for a push
//! let ctx = ExpressionContext::new()
//!     .with("workflow", "ci")
//!     .with("event.ref", "main");
//! let group = resolve_string("${{ workflow }}-${{ event.number || event.ref }}", &ctx).unwrap();
//! assert_eq!(group, "ci-main");
//! ```
//!
//! For file-based workflow loading, see the integration tests.

pub mod cli;
pub mod config;
pub mod error;
pub mod runner;
pub mod secrets;
pub mod shell;
pub mod state;
pub mod steps;
pub mod ui;

pub use error::{ConveyorError, Result};
