//! Immutable configuration values.
//!
//! These are passed explicitly into every chunker / repository / index
//! builder call — there is no process-global configuration state. The
//! `engram-config` crate loads them from disk and environment; everything
//! else just receives them.

use serde::{Deserialize, Serialize};

/// How a snippet is derived from content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnippetStrategy {
    /// Leading characters, clamped to a char boundary.
    #[default]
    First,
    /// The highest-information sentence window.
    SemanticCore,
    /// First sentence … last sentence elision.
    Summary,
}

/// The four index representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStrategy {
    Full,
    Snippet,
    Clustered,
    Hierarchical,
}

impl std::fmt::Display for IndexStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Full => "full",
            Self::Snippet => "snippet",
            Self::Clustered => "clustered",
            Self::Hierarchical => "hierarchical",
        };
        write!(f, "{s}")
    }
}

/// Index building and chunking parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Characters kept in previews.
    #[serde(default = "default_snippet_length")]
    pub snippet_length: usize,

    #[serde(default)]
    pub snippet_strategy: SnippetStrategy,

    /// Hard token budget for the built index.
    #[serde(default = "default_max_index_tokens")]
    pub max_index_tokens: usize,

    /// Explicit strategy override. `None` selects adaptively by match count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_strategy: Option<IndexStrategy>,

    /// Minimum pairwise cosine similarity for two matches to share a cluster.
    #[serde(default = "default_clustering_threshold")]
    pub clustering_threshold: f32,

    /// Groups smaller than this render as individual entries.
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,

    /// Number of recent entities always included verbatim.
    #[serde(default = "default_recent_window_size")]
    pub recent_window_size: usize,

    /// Token count above which content is split into chunks.
    #[serde(default = "default_chunk_threshold")]
    pub chunk_threshold: usize,

    /// Whether ToolCall entities participate in search and indexing.
    #[serde(default = "default_true")]
    pub include_tool_calls: bool,
}

fn default_snippet_length() -> usize {
    160
}
fn default_max_index_tokens() -> usize {
    2048
}
fn default_clustering_threshold() -> f32 {
    0.82
}
fn default_min_cluster_size() -> usize {
    3
}
fn default_recent_window_size() -> usize {
    10
}
fn default_chunk_threshold() -> usize {
    2000
}
fn default_true() -> bool {
    true
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            snippet_length: default_snippet_length(),
            snippet_strategy: SnippetStrategy::default(),
            max_index_tokens: default_max_index_tokens(),
            index_strategy: None,
            clustering_threshold: default_clustering_threshold(),
            min_cluster_size: default_min_cluster_size(),
            recent_window_size: default_recent_window_size(),
            chunk_threshold: default_chunk_threshold(),
            include_tool_calls: default_true(),
        }
    }
}

/// Engine-level timeouts and resource bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deadline for the search half of context preparation.
    #[serde(default = "default_search_timeout_ms")]
    pub search_timeout_ms: u64,

    /// Deadline for index assembly itself.
    #[serde(default = "default_index_timeout_ms")]
    pub index_timeout_ms: u64,

    /// Persist retries before a storage error is surfaced.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Texts per embedding request.
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,

    /// Concurrent embedding requests for one chunk set.
    #[serde(default = "default_embed_concurrency")]
    pub embed_concurrency: usize,

    /// Upper bound on matches pulled for strategy selection. Must exceed
    /// the hierarchical breakpoint (5000) or the top tier is unreachable.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

fn default_search_timeout_ms() -> u64 {
    2_000
}
fn default_index_timeout_ms() -> u64 {
    1_000
}
fn default_max_retries() -> usize {
    3
}
fn default_embed_batch_size() -> usize {
    16
}
fn default_embed_concurrency() -> usize {
    4
}
fn default_search_limit() -> usize {
    8_192
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            search_timeout_ms: default_search_timeout_ms(),
            index_timeout_ms: default_index_timeout_ms(),
            max_retries: default_max_retries(),
            embed_batch_size: default_embed_batch_size(),
            embed_concurrency: default_embed_concurrency(),
            search_limit: default_search_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_config_defaults() {
        let cfg = IndexConfig::default();
        assert_eq!(cfg.snippet_length, 160);
        assert_eq!(cfg.max_index_tokens, 2048);
        assert!(cfg.index_strategy.is_none());
        assert!(cfg.include_tool_calls);
    }

    #[test]
    fn snippet_strategy_serde_names() {
        let s: SnippetStrategy = serde_json::from_str("\"semantic_core\"").unwrap();
        assert_eq!(s, SnippetStrategy::SemanticCore);
    }

    #[test]
    fn strategy_display() {
        assert_eq!(IndexStrategy::Hierarchical.to_string(), "hierarchical");
    }

    #[test]
    fn search_limit_covers_top_tier() {
        assert!(EngineConfig::default().search_limit > 5000);
    }
}
