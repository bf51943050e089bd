//! The adaptive index builder.
//!
//! Strategy selection is a pure function of the deduplicated,
//! filtered match count. Whatever the tier, the rendered index:
//! - never exceeds `max_index_tokens`,
//! - always carries the recent window verbatim (historical content is
//!   sacrificed first; only a recent window that alone overflows the budget
//!   loses its oldest entries),
//! - admits historical entries in descending relevance order and drops a
//!   partial entry whole when the budget runs out mid-entry.
//!
//! Building is deterministic: identical inputs, config, and clock value
//! produce an identical index.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use engram_chunker::{estimate_tokens, make_snippet};
use engram_core::{
    Entity, EntityKind, IndexConfig, IndexStrategy, SearchHit, SnippetStrategy,
};

use crate::cluster::{cluster_hits, Cluster};

/// The built index plus accounting the engine reports.
#[derive(Debug, Clone)]
pub struct BuiltIndex {
    pub strategy: IndexStrategy,
    pub text: String,
    pub token_count: usize,
    /// Match count used for strategy selection (after dedup and filters).
    pub match_count: usize,
    pub recent_count: usize,
    /// Historical entries that made it into the rendering.
    pub entries_included: usize,
    pub entries_dropped: usize,
    /// True when a timeout forced a recency-only rendering.
    pub fallback: bool,
}

/// Stateless builder over an immutable config. Create one and reuse it.
pub struct IndexBuilder {
    cfg: IndexConfig,
}

/// Token-budget admission: entries go in whole or not at all.
struct Renderer {
    lines: Vec<String>,
    used: usize,
    budget: usize,
}

impl Renderer {
    fn new(budget: usize) -> Self {
        Self {
            lines: Vec::new(),
            used: 0,
            budget,
        }
    }

    fn push(&mut self, entry: String) -> bool {
        let tokens = estimate_tokens(&entry);
        if self.used + tokens <= self.budget {
            self.used += tokens;
            self.lines.push(entry);
            true
        } else {
            false
        }
    }

    fn finish(self) -> String {
        self.lines.concat()
    }
}

impl IndexBuilder {
    pub fn new(cfg: IndexConfig) -> Self {
        Self { cfg }
    }

    /// The fixed breakpoints: 0–50 Full, 51–500 Snippet, 501–5000 Clustered,
    /// 5001+ Hierarchical.
    pub fn select_strategy(match_count: usize) -> IndexStrategy {
        match match_count {
            0..=50 => IndexStrategy::Full,
            51..=500 => IndexStrategy::Snippet,
            501..=5000 => IndexStrategy::Clustered,
            _ => IndexStrategy::Hierarchical,
        }
    }

    /// Build the index for one context-preparation call.
    ///
    /// `now` anchors the hierarchical tier's temporal buckets; passing it in
    /// keeps the builder a pure function.
    pub fn build(&self, matches: &[SearchHit], recent: &[Entity], now: DateTime<Utc>) -> BuiltIndex {
        let deduped = self.dedup_and_filter(matches);
        let match_count = deduped.len();
        let strategy = self.cfg.index_strategy.unwrap_or_else(|| Self::select_strategy(match_count));

        // Recent entities arrive newest first; render chronologically.
        let mut recent_window: Vec<&Entity> = recent.iter().filter(|e| !e.deleted).collect();
        recent_window.reverse();

        // Matches already shown verbatim in the recent window would render
        // twice; keep them out of the historical stream.
        let recent_ids: std::collections::HashSet<&str> =
            recent_window.iter().map(|e| e.id.as_str()).collect();
        let historical: Vec<&SearchHit> = deduped
            .iter()
            .filter(|h| !recent_ids.contains(h.entity.id.as_str()))
            .copied()
            .collect();

        let built = match strategy {
            IndexStrategy::Full => self.render_full(&historical, &recent_window),
            IndexStrategy::Snippet => self.render_snippet(&historical, &recent_window),
            IndexStrategy::Clustered => self.render_clustered(&historical, &recent_window),
            IndexStrategy::Hierarchical => self.render_hierarchical(&historical, &recent_window, now),
        };

        let (text, included, dropped) = built;
        let token_count = estimate_tokens(&text);
        debug!(
            %strategy,
            match_count,
            token_count,
            included,
            dropped,
            "built context index"
        );

        BuiltIndex {
            strategy,
            text,
            token_count,
            match_count,
            recent_count: recent_window.len(),
            entries_included: included,
            entries_dropped: dropped,
            fallback: false,
        }
    }

    /// Collapse hits onto their logical entity (best score wins), drop
    /// soft-deleted records, and apply the tool-call filter. Output is
    /// ordered by (score desc, id asc) — the admission order for every tier.
    fn dedup_and_filter<'a>(&self, matches: &'a [SearchHit]) -> Vec<&'a SearchHit> {
        let mut ordered: Vec<&SearchHit> = matches
            .iter()
            .filter(|h| !h.entity.deleted)
            .filter(|h| self.cfg.include_tool_calls || h.entity.kind != EntityKind::ToolCall)
            .collect();
        ordered.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.entity.id.cmp(&b.entity.id))
        });

        let mut seen = std::collections::HashSet::new();
        ordered
            .into_iter()
            .filter(|h| seen.insert(h.entity.logical_key().to_string()))
            .collect()
    }

    fn entry_line(entity: &Entity) -> String {
        let who = match (entity.kind, entity.role) {
            (EntityKind::ToolCall, _) => {
                format!("tool:{}", entity.tool_name.as_deref().unwrap_or("unknown"))
            }
            (_, Some(role)) => format!("{role:?}").to_lowercase(),
            (_, None) => "assistant".to_string(),
        };
        format!(
            "[{}] {}: {}\n",
            entity.created_at.format("%Y-%m-%d %H:%M:%S"),
            who,
            entity.content
        )
    }

    fn snippet_line(&self, entity: &Entity, score: f32) -> String {
        let snippet = if entity.snippet.is_empty() {
            make_snippet(&entity.content, SnippetStrategy::First, self.cfg.snippet_length)
        } else {
            entity.snippet.clone()
        };
        format!(
            "- {} | {} | {:.2} | {}\n",
            entity.id,
            entity.created_at.format("%Y-%m-%d %H:%M"),
            score,
            snippet
        )
    }

    /// Reserve the recent window inside `renderer`. Oldest entries go only
    /// when the window alone cannot fit the whole budget.
    fn render_recent(&self, renderer: &mut Renderer, recent: &[&Entity]) {
        if recent.is_empty() {
            return;
        }
        let header = "## Recent\n".to_string();
        let entries: Vec<String> = recent.iter().map(|e| Self::entry_line(e)).collect();

        let header_tokens = estimate_tokens(&header);
        let entry_tokens: Vec<usize> = entries.iter().map(|e| estimate_tokens(e)).collect();
        let remaining = renderer.budget.saturating_sub(renderer.used);
        let mut start = 0;
        while start < entries.len()
            && header_tokens + entry_tokens[start..].iter().sum::<usize>() > remaining
        {
            // Drop the oldest recent entry; the hard budget wins.
            start += 1;
        }

        if start >= entries.len() {
            return;
        }
        if !renderer.push(header) {
            return;
        }
        for entry in entries.into_iter().skip(start) {
            if !renderer.push(entry) {
                break;
            }
        }
    }

    fn render_full(&self, historical: &[&SearchHit], recent: &[&Entity]) -> (String, usize, usize) {
        let mut renderer = Renderer::new(self.cfg.max_index_tokens);
        if !renderer.push("# Conversation index (full)\n".to_string()) {
            return (renderer.finish(), 0, historical.len());
        }

        // Reserve the recent window first; it is never sacrificed for
        // historical content.
        let recent_entries: Vec<String> = recent.iter().map(|e| Self::entry_line(e)).collect();
        let reserved: usize = recent_entries.iter().map(|e| estimate_tokens(e)).sum();

        // Admit historical matches by relevance into what remains.
        let mut admitted: Vec<&Entity> = Vec::new();
        let mut used = 0usize;
        let available = renderer.budget.saturating_sub(renderer.used + reserved);
        let mut dropped = 0usize;
        for hit in historical {
            let tokens = estimate_tokens(&Self::entry_line(&hit.entity));
            if used + tokens <= available {
                used += tokens;
                admitted.push(&hit.entity);
            } else {
                dropped = historical.len() - admitted.len();
                break;
            }
        }
        let included = admitted.len();

        // Interleave by timestamp.
        let mut timeline: Vec<&Entity> = recent.to_vec();
        timeline.extend(admitted);
        timeline.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        // Degenerate case: if the recent window alone overflows, drop its
        // oldest entries whole.
        let mut entries: Vec<String> = timeline.iter().map(|e| Self::entry_line(e)).collect();
        while renderer.used + entries.iter().map(|e| estimate_tokens(e)).sum::<usize>()
            > renderer.budget
            && !entries.is_empty()
        {
            entries.remove(0);
        }
        for entry in entries {
            if !renderer.push(entry) {
                break;
            }
        }

        (renderer.finish(), included, dropped)
    }

    fn render_snippet(
        &self,
        historical: &[&SearchHit],
        recent: &[&Entity],
    ) -> (String, usize, usize) {
        let mut renderer = Renderer::new(self.cfg.max_index_tokens);
        renderer.push("# Conversation index (snippet)\n".to_string());
        self.render_recent(&mut renderer, recent);

        let mut included = 0;
        let mut dropped = 0;
        if !historical.is_empty() && renderer.push("## History\n".to_string()) {
            for (i, hit) in historical.iter().enumerate() {
                if renderer.push(self.snippet_line(&hit.entity, hit.score)) {
                    included += 1;
                } else {
                    dropped = historical.len() - i;
                    break;
                }
            }
        } else {
            dropped = historical.len();
        }

        (renderer.finish(), included, dropped)
    }

    fn cluster_block(&self, cluster: &Cluster) -> String {
        let rep = cluster.representative();
        let (from, to) = cluster.span();
        let summary = if rep.entity.snippet.is_empty() {
            make_snippet(&rep.entity.content, SnippetStrategy::First, 60)
        } else {
            make_snippet(&rep.entity.snippet, SnippetStrategy::First, 60)
        };

        let mut block = format!(
            "- {} | {}..{} | {} items | handle: {}\n",
            summary,
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d"),
            cluster.members.len(),
            rep.entity.id
        );
        for member in cluster.members.iter().take(3) {
            let sample = if member.entity.snippet.is_empty() {
                make_snippet(&member.entity.content, SnippetStrategy::First, self.cfg.snippet_length)
            } else {
                member.entity.snippet.clone()
            };
            block.push_str(&format!("  · {sample}\n"));
        }
        block
    }

    fn render_clustered(
        &self,
        historical: &[&SearchHit],
        recent: &[&Entity],
    ) -> (String, usize, usize) {
        let mut renderer = Renderer::new(self.cfg.max_index_tokens);
        renderer.push("# Conversation index (clustered)\n".to_string());
        self.render_recent(&mut renderer, recent);

        let owned: Vec<SearchHit> = historical.iter().map(|h| (*h).clone()).collect();
        let (mut clusters, leftovers) =
            cluster_hits(&owned, self.cfg.clustering_threshold, self.cfg.min_cluster_size);
        clusters.sort_by(|a, b| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.representative().entity.id.cmp(&b.representative().entity.id))
        });

        let total_entries = clusters.len() + leftovers.len();
        let mut included = 0;
        let mut stopped = false;

        if !clusters.is_empty() && renderer.push("## Topics\n".to_string()) {
            for cluster in &clusters {
                if renderer.push(self.cluster_block(cluster)) {
                    included += 1;
                } else {
                    stopped = true;
                    break;
                }
            }
        }
        if !stopped && !leftovers.is_empty() && renderer.push("## Other matches\n".to_string()) {
            for hit in &leftovers {
                if renderer.push(self.snippet_line(&hit.entity, hit.score)) {
                    included += 1;
                } else {
                    break;
                }
            }
        }

        (renderer.finish(), included, total_entries - included)
    }

    fn render_hierarchical(
        &self,
        historical: &[&SearchHit],
        recent: &[&Entity],
        now: DateTime<Utc>,
    ) -> (String, usize, usize) {
        let mut renderer = Renderer::new(self.cfg.max_index_tokens);
        renderer.push("# Conversation index (hierarchical)\n".to_string());
        self.render_recent(&mut renderer, recent);

        let today_start = now - Duration::days(1);
        let week_start = now - Duration::days(7);
        let month_start = now - Duration::days(30);

        let mut today = Vec::new();
        let mut week = Vec::new();
        let mut month = Vec::new();
        let mut older = Vec::new();
        for hit in historical {
            let t = hit.entity.created_at;
            if t >= today_start {
                today.push(*hit);
            } else if t >= week_start {
                week.push(*hit);
            } else if t >= month_start {
                month.push(*hit);
            } else {
                older.push(*hit);
            }
        }

        renderer.push("## Timeline\n".to_string());
        for (label, bucket) in [
            ("today", &today),
            ("this week", &week),
            ("this month", &month),
            ("older", &older),
        ] {
            if !renderer.push(format!("- {label}: {} matches\n", bucket.len())) {
                break;
            }
        }

        // Topic roll-up for the most recent non-empty period.
        let freshest: Option<&Vec<&SearchHit>> = [&today, &week, &month, &older]
            .into_iter()
            .find(|b| !b.is_empty());
        if let Some(bucket) = freshest {
            let owned: Vec<SearchHit> = bucket.iter().map(|h| (*h).clone()).collect();
            let (mut clusters, _) =
                cluster_hits(&owned, self.cfg.clustering_threshold, self.cfg.min_cluster_size);
            clusters.sort_by(|a, b| {
                b.members
                    .len()
                    .cmp(&a.members.len())
                    .then_with(|| a.representative().entity.id.cmp(&b.representative().entity.id))
            });
            if !clusters.is_empty() && renderer.push("## Topics (most recent period)\n".to_string())
            {
                for cluster in clusters.iter().take(5) {
                    let rep = cluster.representative();
                    let summary = if rep.entity.snippet.is_empty() {
                        make_snippet(&rep.entity.content, SnippetStrategy::First, 60)
                    } else {
                        make_snippet(&rep.entity.snippet, SnippetStrategy::First, 60)
                    };
                    if !renderer.push(format!("- {summary} ({} items)\n", cluster.members.len())) {
                        break;
                    }
                }
            }
        }

        renderer.push("## Navigation\n".to_string());
        for hint in [
            "- vector_search(query, limit) narrows any period by meaning\n",
            "- get_period_messages(period, limit) lists a period (today|week|month|older)\n",
            "- get_conversation_thread(id, depth) follows a reply chain\n",
            "- get_cluster(id, limit) expands a stored topic\n",
        ] {
            if !renderer.push(hint.to_string()) {
                break;
            }
        }

        // Hierarchical never renders individual matches.
        (renderer.finish(), 0, 0)
    }
}
