//! Configuration loading, parsing, and validation for Conveyor.
//!
//! This module handles all aspects of configuration:
//! - Schema definitions in [`schema`]
//! - File discovery and loading in [`loader`]
//! - Validation in [`validator`]
//! - `${{ ... }}` expressions in [`expression`]
//!
//! # Example
//!
//! ```
//! use conveyor::config::{load_workflows, validate};
//! use tempfile::TempDir;
//! use std::fs;
//!
//! let temp = TempDir::new().unwrap();
//! let dir = temp.path().join(".conveyor").join("workflows");
//! fs::create_dir_all(&dir).unwrap();
//! fs::write(dir.join("lint.yml"), "on: push\njobs:\n  lint:\n    steps:\n      - run: echo ok\n").unwrap();
//!
//! let workflows = load_workflows(temp.path(), None).unwrap();
//! validate(&workflows).unwrap();
//! assert_eq!(workflows[0].name, "lint");
//! ```

pub mod expression;
pub mod loader;
pub mod schema;
pub mod validator;

// Schema re-exports
pub use schema::{
    ArtifactConfig, CommentConfig, ConcurrencyConfig, EventKind, JobConfig, MatrixValue,
    OutputMode, ParameterDefaults, ProjectConfig, Settings, StepConfig, StrategyConfig,
    TriggerFilter, TriggerSpec, WorkflowConfig,
};

// Loader re-exports
pub use loader::{
    apply_env_overrides, find_project_root, load_settings, load_workflow_file, load_workflows,
    parse_workflow, ConfigPaths, LoadedWorkflow, CONFIG_DIR,
};

// Validator re-exports
pub use validator::{validate, validate_workflow, validate_workflows, ValidationError};

// Expression re-exports
pub use expression::{
    extract_expressions, has_expressions, parse_expressions, resolve_string, ExpressionContext,
    Operand, Segment,
};
