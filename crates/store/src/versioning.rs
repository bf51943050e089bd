//! Edit handling: the `unedited → edited` state machine.
//!
//! Edits are one-way (an entity never returns to `unedited`) and always
//! full replacements: content and embedding are regenerated, never diffed.
//! Each edit appends exactly one version record holding the superseded
//! content and the edit timestamp; history is never rewritten.
//!
//! Chunking rules on edit:
//! - an unchunked entity whose new content exceeds the threshold becomes
//!   chunked;
//! - an already-chunked entity re-chunks on every edit, even when the new
//!   content would fit unchunked — the replacement set keeps the chunked
//!   shape (possibly one segment) so chunked state never reverses itself;
//! - the old chunk set is deleted and the new one created in a single
//!   atomic batch, so a concurrent `get_with_chunks` observes either the
//!   whole old set or the whole new set;
//! - only the logical (chunk-index-0) id accepts edits; a chunk record
//!   answers with a conflict and nothing is mutated.

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use engram_chunker::{estimate_tokens, make_snippet, split};
use engram_core::{
    Edge, EdgeKind, Entity, GraphOp, Result, StoreError, VersionRecord,
};

use crate::repository::Repository;

pub(crate) async fn edit(repo: &Repository, id: &str, new_content: &str) -> Result<Entity> {
    let _guard = repo.lock_for(id).await;

    let set = match repo.store.logical(id).await? {
        Some(set) if !set.is_empty() && !set[0].deleted => set,
        _ => return Err(StoreError::NotFound(id.to_string()).into()),
    };
    let target = set
        .iter()
        .find(|e| e.id == id)
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
    if target.is_chunk {
        return Err(StoreError::ChunkEditConflict(id.to_string()).into());
    }

    let head = &set[0];
    let previous_content: String = set.iter().map(|e| e.content.as_str()).collect();
    let was_chunked = head.chunk_parent_id.is_some();

    let mut versions = head.versions.clone();
    versions.push(VersionRecord {
        content: previous_content,
        edited_at: Utc::now(),
    });

    let new_tokens = estimate_tokens(new_content);
    let threshold = repo.index_cfg.chunk_threshold;

    if !was_chunked && new_tokens <= threshold {
        // Simple in-place replacement.
        let mut updated = head.clone();
        updated.content = new_content.to_string();
        updated.token_count = new_tokens;
        updated.snippet = make_snippet(
            new_content,
            repo.index_cfg.snippet_strategy,
            repo.index_cfg.snippet_length,
        );
        updated.embedding = Some(repo.embedder.embed(new_content).await?);
        updated.edited = true;
        updated.versions = versions;
        repo.apply_with_retry(vec![GraphOp::PutNode(updated.clone())]).await?;
        debug!(id, "edited in place");
        return Ok(updated);
    }

    // Chunk-set replacement. Segments of content at or below the threshold
    // still form a one-segment set when the entity was already chunked.
    let segments = if new_tokens <= threshold {
        vec![new_content.to_string()]
    } else {
        split(new_content, threshold)
    };
    let embeddings = repo.embedder.embed_batch(&segments).await?;
    let new_key = Uuid::new_v4().to_string();
    let snippet = make_snippet(
        new_content,
        repo.index_cfg.snippet_strategy,
        repo.index_cfg.snippet_length,
    );

    let mut ops = Vec::new();

    // Drop the stale chunk records (the head is overwritten, not deleted).
    if let Some(old_key) = &head.chunk_parent_id {
        for stale in set.iter().filter(|e| e.is_chunk) {
            ops.push(GraphOp::DeleteNode(stale.id.clone()));
            ops.push(GraphOp::DeleteEdge(Edge::new(&stale.id, old_key, EdgeKind::ChunkOf)));
        }
    }

    let mut updated_head = head.clone();
    for (i, (segment, embedding)) in segments.into_iter().zip(embeddings).enumerate() {
        if i == 0 {
            updated_head.content = segment;
            updated_head.token_count = estimate_tokens(&updated_head.content);
            updated_head.snippet = snippet.clone();
            updated_head.embedding = Some(embedding);
            updated_head.edited = true;
            updated_head.versions = versions.clone();
            updated_head.chunk_index = Some(0);
            updated_head.chunk_parent_id = Some(new_key.clone());
            ops.push(GraphOp::PutNode(updated_head.clone()));
        } else {
            let mut chunk = head.clone();
            chunk.id = Uuid::new_v4().to_string();
            chunk.token_count = estimate_tokens(&segment);
            chunk.content = segment;
            chunk.snippet = String::new();
            chunk.embedding = Some(embedding);
            chunk.edited = false;
            chunk.versions = Vec::new();
            chunk.parent_id = None;
            chunk.is_chunk = true;
            chunk.chunk_index = Some(i as u32);
            chunk.chunk_parent_id = Some(new_key.clone());
            ops.push(GraphOp::PutEdge(Edge::new(&chunk.id, &new_key, EdgeKind::ChunkOf)));
            ops.push(GraphOp::PutNode(chunk));
        }
    }

    repo.apply_with_retry(ops).await?;
    debug!(id, chunked = true, "edited with chunk-set replacement");
    Ok(updated_head)
}
