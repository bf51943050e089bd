//! Direct lookup tools: `get_by_id`, `get_many_by_ids`, `get_with_chunks`.

use async_trait::async_trait;
use std::sync::Arc;

use engram_core::{RetrievalTool, ToolError, ToolResult};
use engram_store::Repository;

use crate::args;

/// Fetch one entity by id.
pub struct GetByIdTool {
    repo: Arc<Repository>,
}

impl GetByIdTool {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl RetrievalTool for GetByIdTool {
    fn name(&self) -> &str {
        "get_by_id"
    }

    fn description(&self) -> &str {
        "Fetch one stored message or tool call by its id."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "The entity id" }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let id = args::require_str(&arguments, "id")?;
        match self.repo.get(&id).await {
            Ok(entity) => {
                let data = args::entity_to_value(&entity);
                Ok(ToolResult::ok(
                    serde_json::to_string_pretty(&data).unwrap_or_default(),
                    Some(data),
                ))
            }
            Err(e) if args::is_not_found(&e) => Ok(args::not_found(&id)),
            Err(e) => Err(args::exec_error(self.name(), e)),
        }
    }
}

/// Fetch several entities at once; missing ids are skipped.
pub struct GetManyByIdsTool {
    repo: Arc<Repository>,
}

impl GetManyByIdsTool {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl RetrievalTool for GetManyByIdsTool {
    fn name(&self) -> &str {
        "get_many_by_ids"
    }

    fn description(&self) -> &str {
        "Fetch several stored entities by id. Ids that do not resolve are silently skipped."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "ids": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Entity ids, at most 100"
                }
            },
            "required": ["ids"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let ids = args::require_ids(&arguments, "ids")?;
        let entities = self
            .repo
            .get_many(&ids)
            .await
            .map_err(|e| args::exec_error(self.name(), e))?;

        if entities.is_empty() {
            return Ok(ToolResult::empty("No entities matched the given ids."));
        }
        let data: Vec<serde_json::Value> = entities.iter().map(args::entity_to_value).collect();
        Ok(ToolResult::ok(
            serde_json::to_string_pretty(&data).unwrap_or_default(),
            Some(serde_json::Value::Array(data)),
        ))
    }
}

/// Fetch a logical entity together with its full chunk set, in order.
pub struct GetWithChunksTool {
    repo: Arc<Repository>,
}

impl GetWithChunksTool {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl RetrievalTool for GetWithChunksTool {
    fn name(&self) -> &str {
        "get_with_chunks"
    }

    fn description(&self) -> &str {
        "Fetch a logical entity and, when it was stored chunked, every chunk in order. \
         Use this to read the complete content of a long message or tool result."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "The logical entity id" }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let id = args::require_str(&arguments, "id")?;
        match self.repo.get_with_chunks(&id).await {
            Ok(set) => {
                let data: Vec<serde_json::Value> = set.iter().map(args::entity_to_value).collect();
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_repo;
    use engram_core::{MessageDraft, Role};

    #[tokio::test]
    async fn get_by_id_round_trip() {
        let repo = test_repo();
        let stored = repo
            .create_message(MessageDraft::new(Role::User, "hello tools"))
            .await
            .unwrap();

        let tool = GetByIdTool::new(Arc::clone(&repo));
        let result = tool
            .execute(serde_json::json!({"id": stored.id}))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.contains("hello tools"));
    }

    #[tokio::test]
    async fn get_by_id_not_found_signal() {
        let tool = GetByIdTool::new(test_repo());
        let result = tool.execute(serde_json::json!({"id": "ghost"})).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.data.unwrap()["error"], "not_found");
    }

    #[tokio::test]
    async fn get_by_id_rejects_empty_id() {
        let tool = GetByIdTool::new(test_repo());
        let err = tool.execute(serde_json::json!({"id": ""})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn get_many_skips_missing() {
        let repo = test_repo();
        let stored = repo
            .create_message(MessageDraft::new(Role::User, "only one"))
            .await
            .unwrap();

        let tool = GetManyByIdsTool::new(repo);
        let result = tool
            .execute(serde_json::json!({"ids": [stored.id, "missing"]}))
            .await
            .unwrap();
        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_with_chunks_returns_ordered_set() {
        let repo = test_repo(); // chunk_threshold = 50 tokens
        let stored = repo
            .create_message(MessageDraft::new(Role::Assistant, "chunky ".repeat(100)))
            .await
            .unwrap();

        let tool = GetWithChunksTool::new(repo);
        let result = tool
            .execute(serde_json::json!({"id": stored.id}))
            .await
            .unwrap();
        assert!(result.success);
        let data = result.data.unwrap();
        let set = data.as_array().unwrap();
        assert!(set.len() > 1);
        assert_eq!(set[0]["chunk"]["chunk_index"], 0);
        assert_eq!(set[1]["chunk"]["chunk_index"], 1);
    }
}
