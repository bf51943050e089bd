//! Tool-call lookups: `get_tool_call` and `get_tool_calls_by_message`.

use async_trait::async_trait;
use std::sync::Arc;

use engram_core::{EntityKind, RetrievalTool, ToolError, ToolResult};
use engram_store::Repository;

use crate::args;

/// Fetch one stored tool invocation by id.
pub struct GetToolCallTool {
    repo: Arc<Repository>,
}

impl GetToolCallTool {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl RetrievalTool for GetToolCallTool {
    fn name(&self) -> &str {
        "get_tool_call"
    }

    fn description(&self) -> &str {
        "Fetch a stored tool invocation: its name, arguments, and result."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "The tool-call id" }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let id = args::require_str(&arguments, "id")?;
        match self.repo.get(&id).await {
            Ok(entity) if entity.kind == EntityKind::ToolCall => {
                let data = args::entity_to_value(&entity);
                Ok(ToolResult::ok(
                    serde_json::to_string_pretty(&data).unwrap_or_default(),
                    Some(data),
                ))
            }
            // A message id is not a tool call; same typed signal as a miss.
            Ok(_) => Ok(args::not_found(&id)),
            Err(e) if args::is_not_found(&e) => Ok(args::not_found(&id)),
            Err(e) => Err(args::exec_error(self.name(), e)),
        }
    }
}

/// List the tool invocations a message triggered.
pub struct GetToolCallsByMessageTool {
    repo: Arc<Repository>,
}

impl GetToolCallsByMessageTool {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl RetrievalTool for GetToolCallsByMessageTool {
    fn name(&self) -> &str {
        "get_tool_calls_by_message"
    }

    fn description(&self) -> &str {
        "List every tool invocation triggered by a given message, if any."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "The triggering message id" }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let id = args::require_str(&arguments, "id")?;
        let calls = self
            .repo
            .tool_calls_for_message(&id)
            .await
            .map_err(|e| args::exec_error(self.name(), e))?;

        if calls.is_empty() {
            return Ok(ToolResult::empty(format!(
                "No tool calls recorded for message '{id}'."
            )));
        }
        let data: Vec<serde_json::Value> = calls.iter().map(args::entity_to_value).collect();
        Ok(ToolResult::ok(
            serde_json::to_string_pretty(&data).unwrap_or_default(),
            Some(serde_json::Value::Array(data)),
        ))
    }
}
