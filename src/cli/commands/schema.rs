//! Schema command implementation.
//!
//! The `conveyor schema` command prints the JSON Schema of a workflow
//! file, for editor integration.

use crate::config::WorkflowConfig;
use crate::error::Result;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};

/// The schema command implementation.
#[derive(Debug, Default)]
pub struct SchemaCommand;

impl SchemaCommand {
    /// Create a new schema command.
    pub fn new() -> Self {
        Self
    }

    /// The workflow schema as pretty-printed JSON.
    pub fn render() -> Result<String> {
        let schema = schemars::schema_for!(WorkflowConfig);
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}

impl Command for SchemaCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        ui.message(&Self::render()?);
        Ok(CommandResult::success())
    }
}
