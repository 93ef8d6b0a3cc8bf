//! Tool executor: the side-effecting calls a model may request.

pub mod news;
pub mod outlets;
pub mod search;
pub mod web;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::types::{Tool, ToolCall, ToolError, ToolResult};

/// One callable tool: its declaration and its implementation
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn tool(&self) -> Tool;

    /// Run the tool. Arguments have already been validated against the
    /// declared input schema.
    async fn call(&self, arguments: Value) -> ToolResult<Value>;
}

/// Ordered set of tools offered to a model
#[derive(Clone, Default)]
pub struct ToolRegistry {
    handlers: Vec<Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Declarations in registration order
    pub fn tools(&self) -> Vec<Tool> {
        self.handlers.iter().map(|h| h.tool()).collect()
    }

    /// Execute a call by tool name.
    ///
    /// Returns `Ok(None)` for names no handler declares; those calls are
    /// skipped rather than reported. Arguments that violate the tool's
    /// schema are rejected before the tool runs.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult<Option<Value>> {
        let Some((handler, tool)) = self
            .handlers
            .iter()
            .map(|h| (h, h.tool()))
            .find(|(_, tool)| tool.name == call.name)
        else {
            tracing::warn!(tool = %call.name, "skipping call to undeclared tool");
            return Ok(None);
        };

        validate_arguments(&tool, &call.arguments)?;
        tracing::debug!(tool = %tool.name, arguments = %call.arguments, "dispatching tool");
        handler.call(call.arguments.clone()).await.map(Some)
    }
}

fn validate_arguments(tool: &Tool, arguments: &Value) -> ToolResult<()> {
    let validator = jsonschema::validator_for(&tool.input_schema)
        .map_err(|e| ToolError::SchemaError(format!("{}: {}", tool.name, e)))?;

    let errors: Vec<String> = validator
        .iter_errors(arguments)
        .map(|error| format!("{}: {}", error.instance_path, error))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ToolError::InvalidParameters(format!(
            "{} rejected arguments {}: {}",
            tool.name,
            arguments,
            errors.join("; ")
        )))
    }
}
