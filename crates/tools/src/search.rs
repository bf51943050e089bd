//! Semantic search tools: `vector_search` and `search_and_retrieve`.

use async_trait::async_trait;
use std::sync::Arc;

use engram_core::{RetrievalTool, SearchResult, ToolError, ToolResult};
use engram_store::Repository;

use crate::args;

/// Nearest-neighbor search returning ranked `(id, snippet, score)` results.
pub struct VectorSearchTool {
    repo: Arc<Repository>,
}

impl VectorSearchTool {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl RetrievalTool for VectorSearchTool {
    fn name(&self) -> &str {
        "vector_search"
    }

    fn description(&self) -> &str {
        "Search the conversation history by meaning. Returns ranked matches with ids and \
         snippets; fetch full content with get_by_id or get_with_chunks."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "What to look for" },
                "limit": {
                    "type": "integer",
                    "description": "Maximum results (default 10, max 100)",
                    "default": 10
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = args::require_str(&arguments, "query")?;
        let limit = args::optional_limit(&arguments, 10)?;

        let include_tool_calls = self.repo.index_config().include_tool_calls;
        let embedding = self
            .repo
            .embed_query(&query)
            .await
            .map_err(|e| args::exec_error(self.name(), e))?;
        let hits = self
            .repo
            .search(&embedding, limit, include_tool_calls)
            .await
            .map_err(|e| args::exec_error(self.name(), e))?;

        if hits.is_empty() {
            return Ok(ToolResult::empty(format!("No matches for '{query}'.")));
        }
        let results: Vec<SearchResult> = hits
            .iter()
            .map(|h| SearchResult::from_entity(&h.entity, h.score))
            .collect();
        let data = serde_json::to_value(&results).unwrap_or_default();
        Ok(ToolResult::ok(
            serde_json::to_string_pretty(&data).unwrap_or_default(),
            Some(data),
        ))
    }
}

/// Search plus retrieval in one step, with an automatic result cutoff.
///
/// When no explicit limit is given, results within 0.25 of the best score
/// are kept (at most 10) — close matches come back whole without a second
/// round-trip, weak tails stay out of context.
pub struct SearchAndRetrieveTool {
    repo: Arc<Repository>,
}

impl SearchAndRetrieveTool {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    const AUTO_CANDIDATES: usize = 25;
    const AUTO_SCORE_BAND: f32 = 0.25;
    const AUTO_MAX: usize = 10;
}

#[async_trait]
impl RetrievalTool for SearchAndRetrieveTool {
    fn name(&self) -> &str {
        "search_and_retrieve"
    }

    fn description(&self) -> &str {
        "Search by meaning and return the full content of the best matches in one call. \
         Without a limit, an automatic cutoff keeps only results close to the best score."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "What to look for" },
                "limit": {
                    "type": "integer",
                    "description": "Optional explicit result count (max 100); omit for automatic"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = args::require_str(&arguments, "query")?;
        let explicit_limit = match arguments.get("limit") {
            None | Some(serde_json::Value::Null) => None,
            Some(_) => Some(args::optional_limit(&arguments, Self::AUTO_MAX)?),
        };

        let include_tool_calls = self.repo.index_config().include_tool_calls;
        let embedding = self
            .repo
            .embed_query(&query)
            .await
            .map_err(|e| args::exec_error(self.name(), e))?;
        let fetch = explicit_limit.unwrap_or(Self::AUTO_CANDIDATES);
        let hits = self
            .repo
            .search(&embedding, fetch, include_tool_calls)
            .await
            .map_err(|e| args::exec_error(self.name(), e))?;

        let selected: Vec<_> = match explicit_limit {
            Some(_) => hits,
            None => {
                let best = hits.first().map(|h| h.score).unwrap_or(0.0);
                hits.into_iter()
                    .filter(|h| h.score >= best - Self::AUTO_SCORE_BAND)
                    .take(Self::AUTO_MAX)
                    .collect()
            }
        };

        if selected.is_empty() {
            return Ok(ToolResult::empty(format!("No matches for '{query}'.")));
        }

        // Retrieve full logical content for each match; chunk hits expand
        // to their whole reassembled entity.
        let mut items = Vec::with_capacity(selected.len());
        for hit in &selected {
            let set = match self.repo.get_with_chunks(&hit.entity.id).await {
                Ok(set) => set,
                Err(e) if args::is_not_found(&e) => continue,
                Err(e) => return Err(args::exec_error(self.name(), e)),
            };
            let Some(head) = set.first() else { continue };
            let content: String = set.iter().map(|e| e.content.as_str()).collect();
            let mut value = args::entity_to_value(head);
            if let Some(obj) = value.as_object_mut() {
                obj.insert("content".into(), serde_json::Value::String(content));
                obj.insert(
                    "score".into(),
                    serde_json::Value::from(f64::from(hit.score)),
                );
            }
            items.push(value);
        }

        let data = serde_json::Value::Array(items);
        Ok(ToolResult::ok(
            serde_json::to_string_pretty(&data).unwrap_or_default(),
            Some(data),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_repo;
    use engram_core::{MessageDraft, Role, ToolCallDraft};

    #[tokio::test]
    async fn vector_search_finds_stored_content() {
        let repo = test_repo();
        repo.create_message(MessageDraft::new(Role::User, "postgres replication lag"))
            .await
            .unwrap();
        repo.create_message(MessageDraft::new(Role::User, "weekend hiking plans"))
            .await
            .unwrap();

        let tool = VectorSearchTool::new(repo);
        let result = tool
            .execute(serde_json::json!({"query": "postgres replication lag"}))
            .await
            .unwrap();
        assert!(result.success);
        let data = result.data.unwrap();
        let results = data.as_array().unwrap();
        assert!(!results.is_empty());
        assert!(results[0]["snippet"]
            .as_str()
            .unwrap()
            .contains("postgres"));
    }

    #[tokio::test]
    async fn vector_search_validates_arguments() {
        let tool = VectorSearchTool::new(test_repo());
        assert!(tool.execute(serde_json::json!({})).await.is_err());
        assert!(tool
            .execute(serde_json::json!({"query": "x", "limit": 0}))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn search_and_retrieve_returns_full_chunked_content() {
        let repo = test_repo(); // chunk_threshold = 50 tokens
        let long = format!("{} {}", "incident report details", "pad ".repeat(120));
        repo.create_message(MessageDraft::new(Role::Assistant, long.clone()))
            .await
            .unwrap();

        let tool = SearchAndRetrieveTool::new(repo);
        let result = tool
            .execute(serde_json::json!({"query": "incident report details"}))
            .await
            .unwrap();
        assert!(result.success);
        let data = result.data.unwrap();
        let items = data.as_array().unwrap();
        assert!(!items.is_empty());
        // Full reassembled content, not just the first chunk's slice.
        assert_eq!(items[0]["content"].as_str().unwrap(), long);
    }

    #[tokio::test]
    async fn tool_call_exclusion_respected() {
        use engram_core::{EngineConfig, IndexConfig};
        use engram_embeddings::HashEmbedder;
        use engram_store::InMemoryGraph;

        let excl_repo = Arc::new(Repository::new(
            Arc::new(InMemoryGraph::new()),
            Arc::new(HashEmbedder::new(64)),
            IndexConfig {
                include_tool_calls: false,
                ..IndexConfig::default()
            },
            EngineConfig::default(),
        ));
        let msg2 = excl_repo
            .create_message(MessageDraft::new(Role::User, "deploy the service"))
            .await
            .unwrap();
        excl_repo
            .create_tool_call(ToolCallDraft::new(
                "shell",
                serde_json::json!({"cmd": "deploy"}),
                serde_json::json!("deploy the service done"),
                &msg2.id,
            ))
            .await
            .unwrap();

        let tool = VectorSearchTool::new(excl_repo);
        let result = tool
            .execute(serde_json::json!({"query": "deploy the service"}))
            .await
            .unwrap();
        let data = result.data.unwrap();
        for item in data.as_array().unwrap() {
            assert_eq!(item["type"], "message");
        }
    }
}
