//! The context engine — the orchestration layer callers talk to.
//!
//! One [`ContextEngine`] owns a repository (over any graph store and
//! embedding provider) and serves the two halves of the contract:
//!
//! - **Ingest**: `record_message` / `record_tool_call` derive snippets and
//!   token counts, generate embeddings (batched for chunk sets), and
//!   persist atomically through the repository.
//! - **Context preparation**: `prepare_context` embeds the query, runs
//!   vector search and recency retrieval concurrently, and hands both to
//!   the adaptive index builder. A search timeout degrades to a
//!   recency-only index; an assembly timeout degrades to the simplest
//!   recent-only rendering. Neither surfaces as a failure.

pub mod maintenance;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::timeout;
use tracing::warn;

use engram_core::{
    EmbeddingProvider, EngineConfig, Entity, GraphStore, IndexConfig, IndexStrategy, MessageDraft,
    Result, ToolCallDraft, ToolRegistry,
};
use engram_embeddings::BatchingEmbedder;
use engram_index::{BuiltIndex, IndexBuilder};
use engram_store::Repository;

pub use maintenance::{run_maintenance, MaintenanceReport};

/// The engine facade.
pub struct ContextEngine {
    repo: Arc<Repository>,
    index_cfg: IndexConfig,
    engine_cfg: EngineConfig,
}

impl ContextEngine {
    pub fn new(
        store: Arc<dyn GraphStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        index_cfg: IndexConfig,
        engine_cfg: EngineConfig,
    ) -> Self {
        let batching = Arc::new(BatchingEmbedder::new(
            embedder,
            engine_cfg.embed_batch_size,
            engine_cfg.embed_concurrency,
        ));
        let repo = Arc::new(Repository::new(
            store,
            batching,
            index_cfg.clone(),
            engine_cfg.clone(),
        ));
        Self {
            repo,
            index_cfg,
            engine_cfg,
        }
    }

    /// The underlying repository, for tools and maintenance jobs.
    pub fn repository(&self) -> Arc<Repository> {
        Arc::clone(&self.repo)
    }

    /// The ten-tool retrieval registry bound to this engine's repository.
    pub fn registry(&self) -> ToolRegistry {
        engram_tools::build_registry(Arc::clone(&self.repo))
    }

    /// Persist a message, chunking it when oversized.
    pub async fn record_message(&self, draft: MessageDraft) -> Result<Entity> {
        self.repo.create_message(draft).await
    }

    /// Persist a tool invocation; its result becomes searchable.
    pub async fn record_tool_call(&self, draft: ToolCallDraft) -> Result<Entity> {
        self.repo.create_tool_call(draft).await
    }

    /// Edit a logical message. See the versioning rules in `engram-store`.
    pub async fn edit_message(&self, id: &str, new_content: &str) -> Result<Entity> {
        self.repo.edit(id, new_content).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.repo.soft_delete(id).await
    }

    /// Build the adaptive context index for one agent turn.
    ///
    /// Never fails on search trouble: a timed-out or errored search yields
    /// a recency-only index flagged `fallback = true`.
    pub async fn prepare_context(&self, query: &str) -> Result<BuiltIndex> {
        let search_deadline = Duration::from_millis(self.engine_cfg.search_timeout_ms);
        let index_deadline = Duration::from_millis(self.engine_cfg.index_timeout_ms);

        let recent_fut = self.repo.recent(self.index_cfg.recent_window_size);
        let search_fut = timeout(search_deadline, async {
            let embedding = self.repo.embed_query(query).await?;
            self.repo
                .search(
                    &embedding,
                    self.engine_cfg.search_limit,
                    self.index_cfg.include_tool_calls,
                )
                .await
        });

        let (recent, search_outcome) = tokio::join!(recent_fut, search_fut);
        let recent = recent?;

        let (matches, degraded) = match search_outcome {
            Ok(Ok(hits)) => (hits, false),
            Ok(Err(e)) => {
                warn!(error = %e, "search failed; building recency-only index");
                (Vec::new(), true)
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.engine_cfg.search_timeout_ms,
                    "search timed out; building recency-only index"
                );
                (Vec::new(), true)
            }
        };

        // Assembly runs off the async thread; if it blows its own deadline
        // we fall back to the simplest recent-only rendering.
        let now = Utc::now();
        let cfg = self.index_cfg.clone();
        let recent_for_build = recent.clone();
        let build = tokio::task::spawn_blocking(move || {
            IndexBuilder::new(cfg).build(&matches, &recent_for_build, now)
        });

        let mut index = match timeout(index_deadline, build).await {
            Ok(Ok(built)) => built,
            Ok(Err(join_err)) => {
                warn!(error = %join_err, "index assembly failed; using recent-only fallback");
                self.recent_only_index(&recent, now)
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.engine_cfg.index_timeout_ms,
                    "index assembly timed out; using recent-only fallback"
                );
                self.recent_only_index(&recent, now)
            }
        };

        if degraded {
            index.fallback = true;
        }
        Ok(index)
    }

    fn recent_only_index(&self, recent: &[Entity], now: chrono::DateTime<Utc>) -> BuiltIndex {
        let cfg = IndexConfig {
            index_strategy: Some(IndexStrategy::Full),
            ..self.index_cfg.clone()
        };
        let mut built = IndexBuilder::new(cfg).build(&[], recent, now);
        built.fallback = true;
        built
    }
}
