//! `get_conversation_thread` — reply-chain navigation.

use async_trait::async_trait;
use std::sync::Arc;

use engram_core::{RetrievalTool, ToolError, ToolResult};
use engram_store::Repository;

use crate::args;

/// Walk a message's reply chain in both directions.
pub struct GetConversationThreadTool {
    repo: Arc<Repository>,
}

impl GetConversationThreadTool {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl RetrievalTool for GetConversationThreadTool {
    fn name(&self) -> &str {
        "get_conversation_thread"
    }

    fn description(&self) -> &str {
        "Follow a message's reply chain: ancestors up to `depth` hops, the message itself, \
         and replies up to `depth` levels down, in timestamp order."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "The message id to start from" },
                "depth": {
                    "type": "integer",
                    "description": "How many hops to walk in each direction (default 5, max 50)",
                    "default": 5
                }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let id = args::require_str(&arguments, "id")?;
        let depth = args::optional_depth(&arguments, 5)?;

        match self.repo.thread(&id, depth).await {
            Ok(thread) => {
                let data: Vec<serde_json::Value> =
                    thread.iter().map(args::entity_to_value).collect();
                Ok(ToolResult::ok(
                    serde_json::to_string_pretty(&data).unwrap_or_default(),
                    Some(serde_json::Value::Array(data)),
                ))
            }
            Err(e) if args::is_not_found(&e) => Ok(args::not_found(&id)),
            Err(e) => Err(args::exec_error(self.name(), e)),
        }
    }
}
