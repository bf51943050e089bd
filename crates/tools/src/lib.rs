//! The retrieval tool surface.
//!
//! Exactly ten read-only tools over the repository. Each validates its
//! arguments, answers in the stable response shapes from `engram-core`, and
//! never mutates state — the dispatcher may run them concurrently.
//!
//! Invalid arguments surface immediately as [`engram_core::ToolError`];
//! a missing single id answers with a typed `not_found` result so the
//! calling agent can correct itself without a hard failure.

use std::sync::Arc;

use engram_core::ToolRegistry;
use engram_store::Repository;

pub mod args;
pub mod cluster;
pub mod lookup;
pub mod period;
pub mod search;
pub mod thread;
pub mod tool_calls;

pub use cluster::GetClusterTool;
pub use lookup::{GetByIdTool, GetManyByIdsTool, GetWithChunksTool};
pub use period::GetPeriodMessagesTool;
pub use search::{SearchAndRetrieveTool, VectorSearchTool};
pub use thread::GetConversationThreadTool;
pub use tool_calls::{GetToolCallTool, GetToolCallsByMessageTool};

/// Build the complete ten-tool registry bound to one repository.
pub fn build_registry(repo: Arc<Repository>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(GetByIdTool::new(Arc::clone(&repo))));
    registry.register(Box::new(GetManyByIdsTool::new(Arc::clone(&repo))));
    registry.register(Box::new(GetWithChunksTool::new(Arc::clone(&repo))));
    registry.register(Box::new(VectorSearchTool::new(Arc::clone(&repo))));
    registry.register(Box::new(GetClusterTool::new(Arc::clone(&repo))));
    registry.register(Box::new(GetPeriodMessagesTool::new(Arc::clone(&repo))));
    registry.register(Box::new(GetConversationThreadTool::new(Arc::clone(&repo))));
    registry.register(Box::new(GetToolCallTool::new(Arc::clone(&repo))));
    registry.register(Box::new(GetToolCallsByMessageTool::new(Arc::clone(&repo))));
    registry.register(Box::new(SearchAndRetrieveTool::new(repo)));
    registry
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_exactly_the_ten_tools() {
        let registry = build_registry(test_support::test_repo());
        assert_eq!(
            registry.names(),
            vec![
                "get_by_id",
                "get_cluster",
                "get_conversation_thread",
                "get_many_by_ids",
                "get_period_messages",
                "get_tool_call",
                "get_tool_calls_by_message",
                "get_with_chunks",
                "search_and_retrieve",
                "vector_search",
            ]
        );
    }

    #[test]
    fn every_tool_has_a_schema_and_description() {
        let registry = build_registry(test_support::test_repo());
        for def in registry.definitions() {
            assert!(!def.description.is_empty(), "{} lacks description", def.name);
            assert_eq!(def.parameters["type"], "object", "{} schema", def.name);
        }
    }
}
