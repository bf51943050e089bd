//! In-memory graph backend — useful for testing and ephemeral sessions.
//!
//! A single `RwLock` over the whole graph makes `apply` trivially atomic:
//! a batch holds the write lock for its duration, and every read method
//! takes one read lock, so logical reads always see a consistent snapshot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use engram_core::vector::cosine_similarity;
use engram_core::{
    Edge, EdgeKind, Entity, EntityKind, GraphOp, GraphStore, SearchFilter, SearchHit, StoreError,
    Topic,
};

#[derive(Default)]
struct State {
    nodes: HashMap<String, Entity>,
    edges: Vec<Edge>,
    topics: HashMap<String, Topic>,
}

/// An in-memory graph store.
pub struct InMemoryGraph {
    state: Arc<RwLock<State>>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
        }
    }
}

impl Default for InMemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

fn chunk_set_of(state: &State, key: &str) -> Vec<Entity> {
    let mut set: Vec<Entity> = state
        .nodes
        .values()
        .filter(|e| e.chunk_parent_id.as_deref() == Some(key))
        .cloned()
        .collect();
    set.sort_by_key(|e| e.chunk_index.unwrap_or(0));
    set
}

#[async_trait]
impl GraphStore for InMemoryGraph {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn apply(&self, ops: Vec<GraphOp>) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        for op in ops {
            match op {
                GraphOp::PutNode(node) => {
                    state.nodes.insert(node.id.clone(), node);
                }
                GraphOp::DeleteNode(id) => {
                    state.nodes.remove(&id);
                }
                GraphOp::PutEdge(edge) => {
                    if !state.edges.contains(&edge) {
                        state.edges.push(edge);
                    }
                }
                GraphOp::DeleteEdge(edge) => {
                    state.edges.retain(|e| *e != edge);
                }
                GraphOp::PutTopic(topic) => {
                    state.topics.insert(topic.id.clone(), topic);
                }
                GraphOp::DeleteTopic(id) => {
                    state.topics.remove(&id);
                }
            }
        }
        Ok(())
    }

    async fn node(&self, id: &str) -> Result<Option<Entity>, StoreError> {
        Ok(self.state.read().await.nodes.get(id).cloned())
    }

    async fn nodes(&self, ids: &[String]) -> Result<Vec<Entity>, StoreError> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.nodes.get(id).cloned()).collect())
    }

    async fn logical(&self, id: &str) -> Result<Option<Vec<Entity>>, StoreError> {
        let state = self.state.read().await;
        let Some(node) = state.nodes.get(id) else {
            return Ok(None);
        };
        match &node.chunk_parent_id {
            Some(key) => Ok(Some(chunk_set_of(&state, key))),
            None => Ok(Some(vec![node.clone()])),
        }
    }

    async fn chunks_of(&self, parent_key: &str) -> Result<Vec<Entity>, StoreError> {
        Ok(chunk_set_of(&*self.state.read().await, parent_key))
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Entity>, StoreError> {
        let state = self.state.read().await;
        let mut top: Vec<Entity> = state
            .nodes
            .values()
            .filter(|e| !e.deleted && !e.is_chunk)
            .cloned()
            .collect();
        top.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        top.truncate(limit);
        Ok(top)
    }

    async fn in_period(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Entity>, StoreError> {
        let state = self.state.read().await;
        let mut hits: Vec<Entity> = state
            .nodes
            .values()
            .filter(|e| !e.deleted && !e.is_chunk && e.created_at >= from && e.created_at < to)
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn edges_to(&self, to: &str, kind: EdgeKind) -> Result<Vec<Edge>, StoreError> {
        let state = self.state.read().await;
        let mut edges: Vec<Edge> = state
            .edges
            .iter()
            .filter(|e| e.to == to && e.kind == kind)
            .cloned()
            .collect();
        edges.sort_by(|a, b| a.from.cmp(&b.from));
        Ok(edges)
    }

    async fn vector_search(
        &self,
        query: &[f32],
        limit: usize,
        filter: SearchFilter,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let state = self.state.read().await;
        let mut hits: Vec<SearchHit> = state
            .nodes
            .values()
            .filter(|e| !e.deleted)
            .filter(|e| filter.include_tool_calls || e.kind != EntityKind::ToolCall)
            .filter_map(|e| {
                let emb = e.embedding.as_ref()?;
                Some(SearchHit {
                    score: cosine_similarity(emb, query),
                    entity: e.clone(),
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.entity.id.cmp(&b.entity.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn topic(&self, id: &str) -> Result<Option<Topic>, StoreError> {
        Ok(self.state.read().await.topics.get(id).cloned())
    }

    async fn topics(&self) -> Result<Vec<Topic>, StoreError> {
        let state = self.state.read().await;
        let mut topics: Vec<Topic> = state.topics.values().cloned().collect();
        topics.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(topics)
    }

    async fn chunk_records(&self) -> Result<Vec<Entity>, StoreError> {
        let state = self.state.read().await;
        Ok(state.nodes.values().filter(|e| e.is_chunk).cloned().collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.state.read().await.nodes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_core::Role;

    fn embedded(content: &str, embedding: Vec<f32>) -> Entity {
        let mut e = Entity::message(Role::User, content);
        e.embedding = Some(embedding);
        e
    }

    #[tokio::test]
    async fn apply_and_read_back() {
        let store = InMemoryGraph::new();
        let e = Entity::message(Role::User, "hello");
        let id = e.id.clone();
        store.apply(vec![GraphOp::PutNode(e)]).await.unwrap();
        assert!(store.node(&id).await.unwrap().is_some());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn grouping_key_is_not_a_node() {
        let store = InMemoryGraph::new();
        let mut e = Entity::message(Role::Assistant, "slice 0");
        e.chunk_parent_id = Some("group_1".into());
        e.chunk_index = Some(0);
        store.apply(vec![GraphOp::PutNode(e)]).await.unwrap();
        assert!(store.node("group_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn logical_returns_full_chunk_set_in_order() {
        let store = InMemoryGraph::new();
        let mut ops = Vec::new();
        let mut first_id = String::new();
        for i in 0..3u32 {
            let mut e = Entity::message(Role::Assistant, format!("slice {i}"));
            e.chunk_parent_id = Some("group_2".into());
            e.chunk_index = Some(i);
            e.is_chunk = i > 0;
            if i == 0 {
                first_id = e.id.clone();
            }
            ops.push(GraphOp::PutNode(e));
        }
        store.apply(ops).await.unwrap();

        let set = store.logical(&first_id).await.unwrap().unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set[0].content, "slice 0");
        assert_eq!(set[2].content, "slice 2");
    }

    #[tokio::test]
    async fn recent_excludes_chunks_and_deleted() {
        let store = InMemoryGraph::new();
        let visible = Entity::message(Role::User, "visible");
        let mut gone = Entity::message(Role::User, "gone");
        gone.deleted = true;
        let mut chunk = Entity::message(Role::User, "chunk");
        chunk.is_chunk = true;
        chunk.chunk_index = Some(1);
        chunk.chunk_parent_id = Some("g".into());
        store
            .apply(vec![
                GraphOp::PutNode(visible),
                GraphOp::PutNode(gone),
                GraphOp::PutNode(chunk),
            ])
            .await
            .unwrap();

        let recent = store.recent(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].content, "visible");
    }

    #[tokio::test]
    async fn vector_search_ranks_and_filters() {
        let store = InMemoryGraph::new();
        let close = embedded("close", vec![1.0, 0.0]);
        let far = embedded("far", vec![0.0, 1.0]);
        let mut tc = Entity::tool_call("calc", "{}", "42", "m");
        tc.embedding = Some(vec![1.0, 0.0]);
        store
            .apply(vec![
                GraphOp::PutNode(close.clone()),
                GraphOp::PutNode(far),
                GraphOp::PutNode(tc),
            ])
            .await
            .unwrap();

        let all = store
            .vector_search(&[1.0, 0.0], 10, SearchFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0].score >= all[1].score);

        let messages_only = store
            .vector_search(
                &[1.0, 0.0],
                10,
                SearchFilter {
                    include_tool_calls: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(messages_only.len(), 2);
        assert_eq!(messages_only[0].entity.content, "close");
    }

    #[tokio::test]
    async fn edges_round_trip() {
        let store = InMemoryGraph::new();
        let edge = Edge::new("tc_1", "msg_1", EdgeKind::CalledBy);
        store.apply(vec![GraphOp::PutEdge(edge.clone())]).await.unwrap();
        let found = store.edges_to("msg_1", EdgeKind::CalledBy).await.unwrap();
        assert_eq!(found, vec![edge.clone()]);

        store.apply(vec![GraphOp::DeleteEdge(edge)]).await.unwrap();
        assert!(store.edges_to("msg_1", EdgeKind::CalledBy).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn topics_round_trip() {
        let store = InMemoryGraph::new();
        let topic = Topic::new("deployment talk", vec!["a".into()], Utc::now(), Utc::now());
        let id = topic.id.clone();
        store.apply(vec![GraphOp::PutTopic(topic)]).await.unwrap();
        assert!(store.topic(&id).await.unwrap().is_some());
        assert_eq!(store.topics().await.unwrap().len(), 1);
    }
}
