// MCP tool definitions and dispatch

use crate::protocol::{CallToolResult, ToolSchema};
use guardian_news_core::{NewsError, NewsResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Tool executor trait
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool schema for MCP
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with given arguments, returning a JSON result
    async fn execute(&self, arguments: serde_json::Value) -> NewsResult<serde_json::Value>;
}

/// Tool registry for managing available tools
///
/// Tools are listed in registration order.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool, replacing any earlier tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.schema().name;
        match self.index.get(&name) {
            Some(&position) => self.tools[position] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&position| Arc::clone(&self.tools[position]))
    }

    /// List all tool schemas
    pub fn list_schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.schema()).collect()
    }

    /// Check if a tool exists
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a tool and wrap its outcome as an MCP result.
    ///
    /// Returns `None` only when no tool has that name. Tool failures become
    /// `isError` results carrying `{"error": {"kind", "message"}}`.
    pub async fn call(&self, name: &str, arguments: serde_json::Value) -> Option<CallToolResult> {
        let tool = self.get(name)?;

        let result = match tool.execute(arguments).await {
            Ok(value) => render(&value).map(CallToolResult::success),
            Err(err) => {
                tracing::warn!(tool = name, kind = err.kind(), error = %err, "Tool call failed");
                render(&serde_json::json!({ "error": err.to_payload() })).map(CallToolResult::failure)
            }
        };

        Some(result.unwrap_or_else(|e| {
            CallToolResult::failure(format!("Failed to serialize tool result: {}", e))
        }))
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn render(value: &serde_json::Value) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

/// Decode tool arguments into a typed struct.
///
/// Missing arguments are treated as an empty object. Unknown, missing or
/// mistyped fields are validation errors.
pub fn parse_args<T: DeserializeOwned>(tool: &str, arguments: serde_json::Value) -> NewsResult<T> {
    let arguments = if arguments.is_null() {
        serde_json::json!({})
    } else {
        arguments
    };

    serde_json::from_value(arguments)
        .map_err(|e| NewsError::validation(format!("Invalid arguments for {}: {}", tool, e)))
}

/// Serialize an operation result for a tool response.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> NewsResult<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| NewsError::InvalidResponse(format!("Failed to serialize result: {}", e)))
}

// Helper functions for creating tool schemas

pub fn json_schema_object(properties: serde_json::Value, required: Vec<&str>) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

pub fn json_schema_string(description: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "string",
        "description": description
    })
}

pub fn json_schema_date(description: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "string",
        "format": "date",
        "description": description
    })
}

pub fn json_schema_integer(description: &str, default: u32, minimum: u32, maximum: u32) -> serde_json::Value {
    serde_json::json!({
        "type": "integer",
        "description": description,
        "default": default,
        "minimum": minimum,
        "maximum": maximum
    })
}
