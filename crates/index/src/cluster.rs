//! Deterministic greedy similarity clustering.
//!
//! Used by the Clustered index tier and by the background topic builder.
//! Determinism matters: the same input set and config must produce the same
//! groupings so indexes are reproducible for testing and caching. It comes
//! from processing hits in (score desc, id asc) order and always joining
//! the first cluster whose representative clears the threshold.

use chrono::{DateTime, Utc};

use engram_core::vector::cosine_similarity;
use engram_core::SearchHit;

/// A group of mutually similar search hits.
#[derive(Debug, Clone)]
pub struct Cluster {
    /// Members ordered by descending score; the first is the representative.
    pub members: Vec<SearchHit>,
}

impl Cluster {
    /// The best-scoring member, used as the retrieval handle.
    pub fn representative(&self) -> &SearchHit {
        &self.members[0]
    }

    pub fn score(&self) -> f32 {
        self.members.first().map(|m| m.score).unwrap_or(0.0)
    }

    /// Earliest and latest member timestamps.
    pub fn span(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let mut from = self.members[0].entity.created_at;
        let mut to = from;
        for m in &self.members {
            from = from.min(m.entity.created_at);
            to = to.max(m.entity.created_at);
        }
        (from, to)
    }
}

/// Partition hits into clusters of pairwise-similar members.
///
/// A hit joins the first existing cluster whose representative embedding
/// has cosine similarity >= `threshold`; otherwise it seeds a new cluster.
/// Groups smaller than `min_size` (and hits without embeddings) are
/// returned as leftovers in score order.
pub fn cluster_hits(
    hits: &[SearchHit],
    threshold: f32,
    min_size: usize,
) -> (Vec<Cluster>, Vec<SearchHit>) {
    let mut ordered: Vec<&SearchHit> = hits.iter().collect();
    ordered.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.entity.id.cmp(&b.entity.id))
    });

    let mut clusters: Vec<Cluster> = Vec::new();
    let mut leftovers: Vec<SearchHit> = Vec::new();

    for hit in ordered {
        let Some(embedding) = hit.entity.embedding.as_ref() else {
            leftovers.push(hit.clone());
            continue;
        };
        let home = clusters.iter_mut().find(|c| {
            c.representative()
                .entity
                .embedding
                .as_ref()
                .map(|rep| cosine_similarity(rep, embedding) >= threshold)
                .unwrap_or(false)
        });
        match home {
            Some(cluster) => cluster.members.push(hit.clone()),
            None => clusters.push(Cluster {
                members: vec![hit.clone()],
            }),
        }
    }

    let min_size = min_size.max(1);
    let (kept, small): (Vec<Cluster>, Vec<Cluster>) = clusters
        .into_iter()
        .partition(|c| c.members.len() >= min_size);
    for cluster in small {
        leftovers.extend(cluster.members);
    }
    leftovers.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.entity.id.cmp(&b.entity.id))
    });

    (kept, leftovers)
}
