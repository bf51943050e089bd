//! `get_cluster` — expand a background-computed topic.

use async_trait::async_trait;
use std::sync::Arc;

use engram_core::{RetrievalTool, ToolError, ToolResult};
use engram_store::Repository;

use crate::args;

/// Fetch a stored topic and its member entities.
pub struct GetClusterTool {
    repo: Arc<Repository>,
}

impl GetClusterTool {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl RetrievalTool for GetClusterTool {
    fn name(&self) -> &str {
        "get_cluster"
    }

    fn description(&self) -> &str {
        "Expand a topic cluster from the index: its summary, time span, and member entities."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "The topic id" },
                "limit": {
                    "type": "integer",
                    "description": "Maximum members to return (default 20, max 100)",
                    "default": 20
                }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let id = args::require_str(&arguments, "id")?;
        let limit = args::optional_limit(&arguments, 20)?;

        let topic = match self.repo.topic(&id).await {
            Ok(topic) => topic,
            Err(e) if args::is_not_found(&e) => return Ok(args::not_found(&id)),
            Err(e) => return Err(args::exec_error(self.name(), e)),
        };
        let members = self
            .repo
            .entities_for_topic(&id, limit)
            .await
            .map_err(|e| args::exec_error(self.name(), e))?;

        let data = serde_json::json!({
            "id": topic.id,
            "summary": topic.summary,
            "from": topic.from,
            "to": topic.to,
            "member_count": topic.member_ids.len(),
            "members": members.iter().map(args::entity_to_value).collect::<Vec<_>>(),
        });
        Ok(ToolResult::ok(
            serde_json::to_string_pretty(&data).unwrap_or_default(),
            Some(data),
        ))
    }
}
