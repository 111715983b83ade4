//! Error types for Conveyor operations.
//!
//! This module defines [`ConveyorError`], the primary error type used throughout
//! the application, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Configuration errors abort before any run starts
//! - Step failures are *outcomes*, not errors: the coordinator records them
//!   and never lets one run's failure abort a sibling run
//! - Use `anyhow::Error` (via `ConveyorError::Other`) for unexpected errors

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for Conveyor operations.
#[derive(Debug, Error)]
pub enum ConveyorError {
    /// Configuration file not found at expected location.
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid configuration structure or values.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// Requested workflow does not exist.
    #[error("Unknown workflow: {name}")]
    UnknownWorkflow { name: String },

    /// Step execution could not be attempted.
    #[error("Step '{step}' failed: {message}")]
    StepExecutionError { step: String, message: String },

    /// Shell command could not be spawned or awaited.
    #[error("Command failed with exit code {code:?}: {command}")]
    CommandFailed { command: String, code: Option<i32> },

    /// Persistent state could not be read or written.
    #[error("State error at {path}: {message}")]
    StateError { path: PathBuf, message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Conveyor operations.
pub type Result<T> = std::result::Result<T, ConveyorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_not_found_displays_path() {
        let err = ConveyorError::ConfigNotFound {
            path: PathBuf::from("/foo/.conveyor/workflows"),
        };
        assert!(err.to_string().contains("/foo/.conveyor/workflows"));
    }

    #[test]
    fn config_parse_error_displays_path_and_message() {
        let err = ConveyorError::ConfigParseError {
            path: PathBuf::from("/lint.yml"),
            message: "invalid syntax".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/lint.yml"));
        assert!(msg.contains("invalid syntax"));
    }

    #[test]
    fn unknown_workflow_displays_name() {
        let err = ConveyorError::UnknownWorkflow {
            name: "nightly".into(),
        };
        assert!(err.to_string().contains("nightly"));
    }

    #[test]
    fn step_execution_error_displays_step_and_message() {
        let err = ConveyorError::StepExecutionError {
            step: "lint".into(),
            message: "command is empty".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("lint"));
        assert!(msg.contains("command is empty"));
    }

    #[test]
    fn command_failed_displays_command_and_code() {
        let err = ConveyorError::CommandFailed {
            command: "black --check .".into(),
            code: Some(1),
        };
        let msg = err.to_string();
        assert!(msg.contains("black --check ."));
        assert!(msg.contains("1"));
    }

    #[test]
    fn state_error_displays_path() {
        let err = ConveyorError::StateError {
            path: PathBuf::from("/state/leases.json"),
            message: "lock timed out".into(),
        };
        assert!(err.to_string().contains("leases.json"));
        assert!(err.to_string().contains("lock timed out"));
    }

    #[test]
    fn io_error_converts_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: ConveyorError = io_err.into();
        assert!(matches!(err, ConveyorError::Io(_)));
    }

    #[test]
    fn json_error_converts() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ConveyorError = json_err.into();
        assert!(matches!(err, ConveyorError::Json(_)));
    }
}
