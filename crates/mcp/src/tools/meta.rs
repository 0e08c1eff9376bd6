// Service introspection tools: health and tool definitions

use crate::protocol::ToolSchema;
use crate::tools::{json_schema_object, parse_args, to_json, Tool};
use guardian_news_core::{NewsResult, NewsService};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoArgs {}

/// Reports API key status and cache statistics
pub struct HealthTool {
    service: Arc<NewsService>,
    api_key: Option<String>,
}

impl HealthTool {
    pub const NAME: &'static str = "health";

    pub fn new(service: Arc<NewsService>, api_key: Option<String>) -> Self {
        Self { service, api_key }
    }
}

/// First four characters of the key followed by an ellipsis.
fn key_preview(key: &str) -> String {
    let head: String = key.chars().take(4).collect();
    format!("{}...", head)
}

#[async_trait::async_trait]
impl Tool for HealthTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.to_string(),
            description: "Check service status, API key configuration and cache statistics."
                .to_string(),
            input_schema: json_schema_object(serde_json::json!({}), vec![]),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> NewsResult<serde_json::Value> {
        let NoArgs {} = parse_args(Self::NAME, arguments)?;

        let (status, key_status) = match self.api_key {
            Some(_) => ("ok", "configured"),
            None => ("degraded", "missing"),
        };

        Ok(serde_json::json!({
            "status": status,
            "environment": {
                "guardian_api_key": key_status,
                "api_key_preview": self.api_key.as_deref().map(key_preview),
            },
            "caches": to_json(&self.service.caches().all_stats())?,
        }))
    }
}

/// Echoes the registry's own schemas as `{"tools": [{name, description, parameters}]}`
pub struct ToolDefinitionsTool {
    schemas: Vec<ToolSchema>,
}

impl ToolDefinitionsTool {
    pub const NAME: &'static str = "get_tool_definitions";

    /// `schemas` are the other registered tools; this tool appends itself.
    pub fn new(mut schemas: Vec<ToolSchema>) -> Self {
        schemas.retain(|schema| schema.name != Self::NAME);
        schemas.push(Self::own_schema());
        Self { schemas }
    }

    fn own_schema() -> ToolSchema {
        ToolSchema {
            name: Self::NAME.to_string(),
            description: "Describe every tool this server exposes, with its parameters."
                .to_string(),
            input_schema: json_schema_object(serde_json::json!({}), vec![]),
        }
    }
}

#[async_trait::async_trait]
impl Tool for ToolDefinitionsTool {
    fn schema(&self) -> ToolSchema {
        Self::own_schema()
    }

    async fn execute(&self, arguments: serde_json::Value) -> NewsResult<serde_json::Value> {
        let NoArgs {} = parse_args(Self::NAME, arguments)?;

        let tools: Vec<serde_json::Value> = self
            .schemas
            .iter()
            .map(|schema| {
                serde_json::json!({
                    "name": schema.name,
                    "description": schema.description,
                    "parameters": schema.input_schema,
                })
            })
            .collect();

        Ok(serde_json::json!({ "tools": tools }))
    }
}
