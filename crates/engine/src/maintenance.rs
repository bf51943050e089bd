//! Background maintenance: topic building and orphaned-chunk cleanup.
//!
//! These jobs run outside the request path, speak to the store only
//! through the repository's public contract, and hold no locks a
//! request-time read could wait on — every pass works from an
//! eventually-consistent snapshot and is safe to repeat.

use tracing::{debug, info};

use engram_chunker::make_snippet;
use engram_core::{IndexConfig, Result, SearchHit, SnippetStrategy, Topic};
use engram_index::cluster_hits;
use engram_store::Repository;

/// How many recent entities one topic-building pass considers.
const TOPIC_SCAN_WINDOW: usize = 1_024;

/// What one maintenance pass did.
#[derive(Debug, Default, Clone)]
pub struct MaintenanceReport {
    pub topics_created: usize,
    pub topics_removed: usize,
    pub orphan_chunks_removed: usize,
}

/// Run one full maintenance pass: rebuild topics, then purge orphans.
pub async fn run_maintenance(repo: &Repository, cfg: &IndexConfig) -> Result<MaintenanceReport> {
    let mut report = MaintenanceReport::default();
    rebuild_topics(repo, cfg, &mut report).await?;
    cleanup_orphan_chunks(repo, &mut report).await?;
    info!(
        topics_created = report.topics_created,
        topics_removed = report.topics_removed,
        orphans = report.orphan_chunks_removed,
        "maintenance pass complete"
    );
    Ok(report)
}

/// Re-derive topic clusters from the recent scan window.
///
/// Topics are cheap, derived data: each pass replaces the previous set
/// rather than trying to patch it.
async fn rebuild_topics(
    repo: &Repository,
    cfg: &IndexConfig,
    report: &mut MaintenanceReport,
) -> Result<()> {
    let entities = repo.recent(TOPIC_SCAN_WINDOW).await?;
    let hits: Vec<SearchHit> = entities
        .into_iter()
        .filter(|e| e.embedding.is_some())
        .map(|entity| SearchHit { entity, score: 1.0 })
        .collect();

    let (clusters, _) = cluster_hits(&hits, cfg.clustering_threshold, cfg.min_cluster_size);

    for old in repo.topics().await? {
        repo.delete_topic(&old.id).await?;
        report.topics_removed += 1;
    }

    for cluster in clusters {
        let rep = cluster.representative();
        let summary = if rep.entity.snippet.is_empty() {
            make_snippet(&rep.entity.content, SnippetStrategy::First, 60)
        } else {
            make_snippet(&rep.entity.snippet, SnippetStrategy::First, 60)
        };
        let (from, to) = cluster.span();
        let member_ids = cluster
            .members
            .iter()
            .map(|m| m.entity.id.clone())
            .collect();
        repo.create_topic(Topic::new(summary, member_ids, from, to)).await?;
        report.topics_created += 1;
    }
    Ok(())
}

/// Physically remove chunk records whose grouping key lost its index-0
/// head — the one case where deletion is not soft.
async fn cleanup_orphan_chunks(repo: &Repository, report: &mut MaintenanceReport) -> Result<()> {
    let chunks = repo.chunk_records().await?;
    let mut keys: Vec<String> = chunks
        .into_iter()
        .filter_map(|c| c.chunk_parent_id)
        .collect();
    keys.sort_unstable();
    keys.dedup();

    for key in keys {
        let set = repo.chunk_set(&key).await?;
        let has_head = set.iter().any(|e| e.chunk_index == Some(0));
        if has_head {
            continue;
        }
        let ids: Vec<String> = set.into_iter().map(|e| e.id).collect();
        debug!(key = %key, count = ids.len(), "removing orphaned chunk set");
        report.orphan_chunks_removed += ids.len();
        repo.purge_nodes(&ids).await?;
    }
    Ok(())
}
