//! GraphStore trait — the seam to the persistent graph engine.
//!
//! The real storage engine is an external collaborator; Engram only relies
//! on this contract: node/edge CRUD applied as atomic batches, indexed
//! property lookups, and nearest-neighbor vector search. Two reference
//! backends ship in `engram-store` (in-memory and SQLite).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, SearchHit, Topic};
use crate::error::StoreError;

/// Relationship kinds between nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Message → earlier message it replies to.
    ReplyTo,
    /// Chunk record → synthetic grouping key.
    ChunkOf,
    /// Tool call → the message that triggered it.
    CalledBy,
    /// Entity → topic.
    BelongsTo,
}

/// A directed, typed relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            kind,
        }
    }
}

/// One mutation in an atomic batch.
#[derive(Debug, Clone)]
pub enum GraphOp {
    PutNode(Entity),
    /// Physical removal. Request-time flows use soft delete instead; this
    /// exists for chunk-set replacement and background cleanup.
    DeleteNode(String),
    PutEdge(Edge),
    DeleteEdge(Edge),
    PutTopic(Topic),
    DeleteTopic(String),
}

/// Restrictions applied to vector search.
#[derive(Debug, Clone, Copy)]
pub struct SearchFilter {
    /// When false, ToolCall entities (and their chunks) are excluded.
    pub include_tool_calls: bool,
}

impl Default for SearchFilter {
    fn default() -> Self {
        Self {
            include_tool_calls: true,
        }
    }
}

/// The graph storage contract.
///
/// All write paths go through [`GraphStore::apply`], which is atomic: either
/// every op in the batch takes effect or none does. Read methods that serve
/// a logical entity ([`GraphStore::logical`]) return a single consistent
/// snapshot, so a reader never observes a half-replaced chunk set.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// The backend name (e.g., "in_memory", "sqlite").
    fn name(&self) -> &str;

    /// Apply a batch of mutations atomically.
    async fn apply(&self, ops: Vec<GraphOp>) -> Result<(), StoreError>;

    /// Fetch one node by id. Returns soft-deleted nodes too; callers that
    /// must treat them as absent filter on `deleted`.
    async fn node(&self, id: &str) -> Result<Option<Entity>, StoreError>;

    /// Fetch many nodes by id. Missing ids are skipped.
    async fn nodes(&self, ids: &[String]) -> Result<Vec<Entity>, StoreError>;

    /// Atomic logical read: the node plus, when it is chunked, its whole
    /// chunk set ordered by `chunk_index` ascending — all from one snapshot.
    async fn logical(&self, id: &str) -> Result<Option<Vec<Entity>>, StoreError>;

    /// All records sharing a chunk grouping key, ordered by `chunk_index`.
    async fn chunks_of(&self, parent_key: &str) -> Result<Vec<Entity>, StoreError>;

    /// The N most recent non-deleted top-level (non-chunk) entities,
    /// newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<Entity>, StoreError>;

    /// Non-deleted top-level entities created within `[from, to)`,
    /// newest first, capped at `limit`.
    async fn in_period(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Entity>, StoreError>;

    /// Edges of `kind` pointing at `to`.
    async fn edges_to(&self, to: &str, kind: EdgeKind) -> Result<Vec<Edge>, StoreError>;

    /// Nearest-neighbor search over non-deleted embedded records, scored by
    /// cosine similarity, best first. Ties break on ascending id so results
    /// are deterministic.
    async fn vector_search(
        &self,
        query: &[f32],
        limit: usize,
        filter: SearchFilter,
    ) -> Result<Vec<SearchHit>, StoreError>;

    async fn topic(&self, id: &str) -> Result<Option<Topic>, StoreError>;

    async fn topics(&self) -> Result<Vec<Topic>, StoreError>;

    /// Every chunk record (`is_chunk = true`). Maintenance scans only.
    async fn chunk_records(&self) -> Result<Vec<Entity>, StoreError>;

    /// Total node count, including soft-deleted records.
    async fn count(&self) -> Result<usize, StoreError>;
}
