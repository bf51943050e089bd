//! The entity repository.
//!
//! Sits on top of any [`GraphStore`] and enforces the entity-level rules:
//! oversized content is persisted as an atomic chunk set, chunk index 0 is
//! the canonical record, writes to one logical id are serialized, deletes
//! are soft, and persistence failures are retried before surfacing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

use engram_chunker::{estimate_tokens, make_snippet, split};
use engram_core::{
    Edge, EdgeKind, EmbeddingProvider, EngineConfig, Entity, GraphOp, GraphStore, IndexConfig,
    MessageDraft, Result, SearchFilter, SearchHit, StoreError, ToolCallDraft, Topic,
};

/// Repository over a graph store and an embedding provider.
///
/// Configuration is an immutable value fixed at construction; there is no
/// process-global state.
pub struct Repository {
    pub(crate) store: Arc<dyn GraphStore>,
    pub(crate) embedder: Arc<dyn EmbeddingProvider>,
    pub(crate) index_cfg: IndexConfig,
    pub(crate) engine_cfg: EngineConfig,
    write_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Repository {
    pub fn new(
        store: Arc<dyn GraphStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        index_cfg: IndexConfig,
        engine_cfg: EngineConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            index_cfg,
            engine_cfg,
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn index_config(&self) -> &IndexConfig {
        &self.index_cfg
    }

    /// Serialize writes per logical id. Guards are owned so they can be held
    /// across awaits in the persist pipeline.
    pub(crate) async fn lock_for(&self, logical_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.write_locks.lock().await;
            Arc::clone(
                locks
                    .entry(logical_id.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    pub(crate) async fn apply_with_retry(&self, ops: Vec<GraphOp>) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.store.apply(ops.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.engine_cfg.max_retries => {
                    attempt += 1;
                    warn!(error = %e, attempt, "persist failed, retrying");
                    tokio::time::sleep(Duration::from_millis(50 * attempt as u64)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Turn a template record plus its full content into the records to
    /// persist: either the single entity, or an ordered chunk set where the
    /// template becomes chunk index 0. All embeddings are generated (in
    /// provider-sized batches) before anything is handed to the store.
    pub(crate) async fn assemble_records(
        &self,
        mut template: Entity,
        content: String,
    ) -> Result<Vec<Entity>> {
        let tokens = estimate_tokens(&content);
        let snippet = make_snippet(
            &content,
            self.index_cfg.snippet_strategy,
            self.index_cfg.snippet_length,
        );

        if tokens <= self.index_cfg.chunk_threshold {
            template.content = content;
            template.token_count = tokens;
            template.snippet = snippet;
            template.embedding = Some(self.embedder.embed(&template.content).await?);
            return Ok(vec![template]);
        }

        let segments = split(&content, self.index_cfg.chunk_threshold);
        let embeddings = self.embedder.embed_batch(&segments).await?;
        let group_key = Uuid::new_v4().to_string();

        let mut records = Vec::with_capacity(segments.len());
        for (i, (segment, embedding)) in segments.into_iter().zip(embeddings).enumerate() {
            let mut record = template.clone();
            record.token_count = estimate_tokens(&segment);
            record.content = segment;
            record.embedding = Some(embedding);
            record.chunk_index = Some(i as u32);
            record.chunk_parent_id = Some(group_key.clone());
            if i == 0 {
                // Canonical record: keeps the logical id, the snippet, and
                // the reply-chain / called-by linkage.
                record.snippet = snippet.clone();
            } else {
                record.id = Uuid::new_v4().to_string();
                record.is_chunk = true;
                record.snippet = String::new();
                record.parent_id = None;
            }
            records.push(record);
        }
        Ok(records)
    }

    /// Ops to persist a freshly assembled record set, including its edges.
    pub(crate) fn persist_ops(records: &[Entity], linkage: Option<EdgeKind>) -> Vec<GraphOp> {
        let mut ops = Vec::new();
        for record in records {
            ops.push(GraphOp::PutNode(record.clone()));
            if record.is_chunk {
                if let Some(key) = &record.chunk_parent_id {
                    ops.push(GraphOp::PutEdge(Edge::new(&record.id, key, EdgeKind::ChunkOf)));
                }
            }
        }
        if let (Some(kind), Some(head)) = (linkage, records.first()) {
            if let Some(parent) = &head.parent_id {
                ops.push(GraphOp::PutEdge(Edge::new(&head.id, parent, kind)));
            }
        }
        ops
    }

    /// Persist a new message, chunking it when oversized.
    pub async fn create_message(&self, draft: MessageDraft) -> Result<Entity> {
        let mut template = Entity::message(draft.role, String::new());
        template.parent_id = draft.parent_id;
        template.metadata = draft.metadata;

        let records = self.assemble_records(template, draft.content).await?;
        let Some(head) = records.first().cloned() else {
            return Err(engram_core::Error::Internal("empty record set".into()));
        };
        let ops = Self::persist_ops(&records, Some(EdgeKind::ReplyTo));

        let _guard = self.lock_for(&head.id).await;
        self.apply_with_retry(ops).await?;
        debug!(id = %head.id, chunks = records.len(), "stored message");
        Ok(head)
    }

    /// Persist a new tool call. The embedding is mandatory — results must
    /// be searchable — so this follows the same embed-then-persist path.
    pub async fn create_tool_call(&self, draft: ToolCallDraft) -> Result<Entity> {
        let content = serde_json::to_string(&draft.result)?;
        let arguments = serde_json::to_string(&draft.arguments)?;
        let mut template = Entity::tool_call(draft.tool_name, arguments, String::new(), draft.message_id);
        template.metadata = draft.metadata;

        let records = self.assemble_records(template, content).await?;
        let Some(head) = records.first().cloned() else {
            return Err(engram_core::Error::Internal("empty record set".into()));
        };
        let ops = Self::persist_ops(&records, Some(EdgeKind::CalledBy));

        let _guard = self.lock_for(&head.id).await;
        self.apply_with_retry(ops).await?;
        debug!(id = %head.id, chunks = records.len(), "stored tool call");
        Ok(head)
    }

    /// Fetch one record. Soft-deleted ids and chunk grouping keys are
    /// not-found: the grouping key is never addressable as an entity.
    pub async fn get(&self, id: &str) -> Result<Entity> {
        match self.store.node(id).await? {
            Some(e) if !e.deleted => Ok(e),
            _ => Err(StoreError::NotFound(id.to_string()).into()),
        }
    }

    /// Bulk fetch. Missing and soft-deleted ids are skipped, not errors.
    pub async fn get_many(&self, ids: &[String]) -> Result<Vec<Entity>> {
        let found = self.store.nodes(ids).await?;
        Ok(found.into_iter().filter(|e| !e.deleted).collect())
    }

    /// Logical read: the record plus its whole chunk set, ordered by
    /// `chunk_index`, from one consistent snapshot.
    pub async fn get_with_chunks(&self, id: &str) -> Result<Vec<Entity>> {
        match self.store.logical(id).await? {
            Some(set) if !set.is_empty() && !set[0].deleted => Ok(set),
            _ => Err(StoreError::NotFound(id.to_string()).into()),
        }
    }

    /// Soft-delete a logical entity and its chunk set. The records stay in
    /// the store for audit but vanish from reads, search, and indexing.
    pub async fn soft_delete(&self, id: &str) -> Result<()> {
        let _guard = self.lock_for(id).await;
        let set = self.get_with_chunks(id).await?;
        let target = set
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if target.is_chunk {
            return Err(StoreError::ChunkEditConflict(id.to_string()).into());
        }

        let ops = set
            .into_iter()
            .map(|mut e| {
                e.deleted = true;
                GraphOp::PutNode(e)
            })
            .collect();
        self.apply_with_retry(ops).await
    }

    /// Edit a logical entity's content. See [`crate::versioning`].
    pub async fn edit(&self, id: &str, new_content: &str) -> Result<Entity> {
        crate::versioning::edit(self, id, new_content).await
    }

    /// Nearest-neighbor search over non-deleted embeddings.
    pub async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        include_tool_calls: bool,
    ) -> Result<Vec<SearchHit>> {
        Ok(self
            .store
            .vector_search(query_embedding, limit, SearchFilter { include_tool_calls })
            .await?)
    }

    /// The N most recent non-deleted top-level entities, newest first.
    pub async fn recent(&self, n: usize) -> Result<Vec<Entity>> {
        Ok(self.store.recent(n).await?)
    }

    pub async fn in_period(
        &self,
        from: chrono::DateTime<chrono::Utc>,
        to: chrono::DateTime<chrono::Utc>,
        limit: usize,
    ) -> Result<Vec<Entity>> {
        Ok(self.store.in_period(from, to, limit).await?)
    }

    /// Tool calls triggered by a message, via called-by edges.
    pub async fn tool_calls_for_message(&self, message_id: &str) -> Result<Vec<Entity>> {
        let edges = self.store.edges_to(message_id, EdgeKind::CalledBy).await?;
        let ids: Vec<String> = edges.into_iter().map(|e| e.from).collect();
        self.get_many(&ids).await
    }

    /// Walk the reply chain: ancestors up to `depth` hops, the entity
    /// itself, and replies breadth-first up to `depth` levels down.
    /// Returned in timestamp order.
    pub async fn thread(&self, id: &str, depth: usize) -> Result<Vec<Entity>> {
        let start = self.get(id).await?;
        let mut collected: HashMap<String, Entity> = HashMap::new();
        collected.insert(start.id.clone(), start.clone());

        let mut current = start.clone();
        for _ in 0..depth {
            let Some(parent_id) = current.parent_id.clone() else {
                break;
            };
            match self.store.node(&parent_id).await? {
                Some(parent) if !parent.deleted => {
                    collected.insert(parent.id.clone(), parent.clone());
                    current = parent;
                }
                _ => break,
            }
        }

        let mut frontier = vec![start.id.clone()];
        for _ in 0..depth {
            let mut next = Vec::new();
            for node_id in &frontier {
                for edge in self.store.edges_to(node_id, EdgeKind::ReplyTo).await? {
                    if collected.contains_key(&edge.from) {
                        continue;
                    }
                    if let Some(child) = self.store.node(&edge.from).await? {
                        if !child.deleted {
                            next.push(child.id.clone());
                            collected.insert(child.id.clone(), child);
                        }
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        let mut thread: Vec<Entity> = collected.into_values().collect();
        thread.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(thread)
    }

    /// Persist a background-computed topic and its belongs-to edges.
    pub async fn create_topic(&self, topic: Topic) -> Result<Topic> {
        let mut ops = vec![GraphOp::PutTopic(topic.clone())];
        for member in &topic.member_ids {
            ops.push(GraphOp::PutEdge(Edge::new(member, &topic.id, EdgeKind::BelongsTo)));
        }
        self.apply_with_retry(ops).await?;
        Ok(topic)
    }

    pub async fn topic(&self, id: &str) -> Result<Topic> {
        self.store
            .topic(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()).into())
    }

    pub async fn topics(&self) -> Result<Vec<Topic>> {
        Ok(self.store.topics().await?)
    }

    /// Member entities of a topic, best match first, capped at `limit`.
    pub async fn entities_for_topic(&self, id: &str, limit: usize) -> Result<Vec<Entity>> {
        let topic = self.topic(id).await?;
        let ids: Vec<String> = topic.member_ids.into_iter().take(limit).collect();
        self.get_many(&ids).await
    }

    /// Remove a topic and its belongs-to edges.
    pub async fn delete_topic(&self, id: &str) -> Result<()> {
        let edges = self.store.edges_to(id, EdgeKind::BelongsTo).await?;
        let mut ops: Vec<GraphOp> = edges.into_iter().map(GraphOp::DeleteEdge).collect();
        ops.push(GraphOp::DeleteTopic(id.to_string()));
        self.apply_with_retry(ops).await
    }

    /// Every chunk record. Background-maintenance scans only.
    pub async fn chunk_records(&self) -> Result<Vec<Entity>> {
        Ok(self.store.chunk_records().await?)
    }

    /// All records sharing a chunk grouping key, ordered by index.
    pub async fn chunk_set(&self, parent_key: &str) -> Result<Vec<Entity>> {
        Ok(self.store.chunks_of(parent_key).await?)
    }

    /// Physically remove records. The only sanctioned caller is background
    /// orphaned-chunk cleanup; request-time flows use [`Self::soft_delete`].
    pub async fn purge_nodes(&self, ids: &[String]) -> Result<()> {
        let ops = ids.iter().map(|id| GraphOp::DeleteNode(id.clone())).collect();
        self.apply_with_retry(ops).await
    }

    pub async fn count(&self) -> Result<usize> {
        Ok(self.store.count().await?)
    }

    /// Embed arbitrary text with this repository's provider. Used by the
    /// engine and the search tools so query and content embeddings always
    /// come from the same model.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embedder.embed(text).await?)
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryGraph;
    use engram_core::{EntityKind, Error, Role};
    use engram_embeddings::HashEmbedder;

    fn test_repo() -> Repository {
        let cfg = IndexConfig {
            chunk_threshold: 4_000,
            ..IndexConfig::default()
        };
        Repository::new(
            Arc::new(InMemoryGraph::new()),
            Arc::new(HashEmbedder::new(64)),
            cfg,
            EngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn small_message_is_not_chunked() {
        let repo = test_repo();
        let stored = repo
            .create_message(MessageDraft::new(Role::User, "a short message"))
            .await
            .unwrap();
        assert!(!stored.is_chunk);
        assert!(stored.chunk_parent_id.is_none());
        assert!(stored.embedding.is_some());
        assert_eq!(stored.content, "a short message");
        assert!(!stored.snippet.is_empty());
    }

    #[tokio::test]
    async fn oversized_message_chunks_into_three() {
        let repo = test_repo();
        // 40,000 chars ≈ 10,000 tokens at the 4,000-token threshold.
        let content = "abcd".repeat(10_000);
        let stored = repo
            .create_message(MessageDraft::new(Role::Assistant, content.clone()))
            .await
            .unwrap();

        assert_eq!(stored.chunk_index, Some(0));
        assert!(!stored.is_chunk);
        assert!(!stored.snippet.is_empty());

        let set = repo.get_with_chunks(&stored.id).await.unwrap();
        assert_eq!(set.len(), 3);
        for (i, record) in set.iter().enumerate() {
            assert_eq!(record.chunk_index, Some(i as u32));
            assert!(record.embedding.is_some());
            if i > 0 {
                assert!(record.is_chunk);
                assert!(record.snippet.is_empty());
            }
        }

        let reassembled: String = set.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(reassembled, content);
    }

    #[tokio::test]
    async fn grouping_key_lookup_is_not_found() {
        let repo = test_repo();
        let stored = repo
            .create_message(MessageDraft::new(Role::User, "xyzw".repeat(10_000)))
            .await
            .unwrap();
        let key = stored.chunk_parent_id.unwrap();
        let err = repo.get(&key).await.unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn tool_call_gets_called_by_edge() {
        let repo = test_repo();
        let msg = repo
            .create_message(MessageDraft::new(Role::User, "what is 2+2?"))
            .await
            .unwrap();
        let tc = repo
            .create_tool_call(ToolCallDraft::new(
                "calculator",
                serde_json::json!({"expr": "2+2"}),
                serde_json::json!({"value": 4}),
                &msg.id,
            ))
            .await
            .unwrap();
        assert_eq!(tc.kind, EntityKind::ToolCall);
        assert!(tc.embedding.is_some());

        let calls = repo.tool_calls_for_message(&msg.id).await.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, tc.id);
    }

    #[tokio::test]
    async fn soft_delete_hides_from_everything() {
        let repo = test_repo();
        let stored = repo
            .create_message(MessageDraft::new(Role::User, "disappearing act"))
            .await
            .unwrap();

        repo.soft_delete(&stored.id).await.unwrap();

        assert!(matches!(
            repo.get(&stored.id).await.unwrap_err(),
            Error::Store(StoreError::NotFound(_))
        ));
        assert!(repo.recent(10).await.unwrap().is_empty());
        let embedding = repo.embed_query("disappearing act").await.unwrap();
        assert!(repo.search(&embedding, 10, true).await.unwrap().is_empty());
        // Still present for audit.
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn get_many_skips_missing() {
        let repo = test_repo();
        let a = repo
            .create_message(MessageDraft::new(Role::User, "first"))
            .await
            .unwrap();
        let found = repo
            .get_many(&[a.id.clone(), "no_such_id".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn thread_walks_both_directions() {
        let repo = test_repo();
        let root = repo
            .create_message(MessageDraft::new(Role::User, "root"))
            .await
            .unwrap();
        let reply = repo
            .create_message(MessageDraft::new(Role::Assistant, "reply").with_parent(&root.id))
            .await
            .unwrap();
        let nested = repo
            .create_message(MessageDraft::new(Role::User, "nested").with_parent(&reply.id))
            .await
            .unwrap();

        let thread = repo.thread(&reply.id, 5).await.unwrap();
        let contents: Vec<&str> = thread.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["root", "reply", "nested"]);

        // Depth 0 returns just the entity itself.
        let only = repo.thread(&nested.id, 0).await.unwrap();
        assert_eq!(only.len(), 1);
    }

    #[tokio::test]
    async fn topics_round_trip_through_repository() {
        let repo = test_repo();
        let m = repo
            .create_message(MessageDraft::new(Role::User, "about deployments"))
            .await
            .unwrap();
        let topic = repo
            .create_topic(Topic::new(
                "deployments",
                vec![m.id.clone()],
                m.created_at,
                m.created_at,
            ))
            .await
            .unwrap();

        let fetched = repo.topic(&topic.id).await.unwrap();
        assert_eq!(fetched.summary, "deployments");
        let members = repo.entities_for_topic(&topic.id, 10).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, m.id);
    }

    #[tokio::test]
    async fn search_respects_tool_call_filter() {
        let repo = test_repo();
        let msg = repo
            .create_message(MessageDraft::new(Role::User, "kubernetes cluster restart"))
            .await
            .unwrap();
        repo.create_tool_call(ToolCallDraft::new(
            "shell",
            serde_json::json!({"cmd": "kubectl"}),
            serde_json::json!("kubernetes cluster restart output"),
            &msg.id,
        ))
        .await
        .unwrap();

        let embedding = repo.embed_query("kubernetes cluster restart").await.unwrap();
        let with_tools = repo.search(&embedding, 10, true).await.unwrap();
        let without_tools = repo.search(&embedding, 10, false).await.unwrap();
        assert!(with_tools.len() > without_tools.len());
        assert!(without_tools
            .iter()
            .all(|h| h.entity.kind == EntityKind::Message));
    }
}
