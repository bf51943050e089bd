//! CLI command implementations.

pub mod context;
pub mod init;
pub mod maintain;
pub mod record;
pub mod search;
pub mod show;
pub mod stats;
pub mod tools;

use std::sync::Arc;

use engram_config::AppConfig;
use engram_core::{EmbeddingProvider, GraphStore};
use engram_embeddings::{HashEmbedder, OpenAiCompatEmbedder};
use engram_engine::ContextEngine;
use engram_store::{InMemoryGraph, SqliteGraph};

/// Build an engine from the loaded configuration.
///
/// Falls back to the deterministic hash embedder when no API key is
/// available, so every command works offline.
pub(crate) async fn build_engine(
    config: &AppConfig,
) -> Result<ContextEngine, Box<dyn std::error::Error>> {
    let store: Arc<dyn GraphStore> = match config.store.backend.as_str() {
        "memory" => Arc::new(InMemoryGraph::new()),
        _ => {
            let dir = AppConfig::config_dir();
            if !dir.exists() {
                std::fs::create_dir_all(&dir)?;
            }
            let path = config.db_path();
            Arc::new(SqliteGraph::new(&format!("sqlite://{}", path.display())).await?)
        }
    };

    let embedder: Arc<dyn EmbeddingProvider> = match (config.embedding.provider.as_str(), &config.api_key) {
        ("openai", Some(key)) => {
            let mut provider = OpenAiCompatEmbedder::new(key.clone())
                .with_model(config.embedding.model.clone(), config.embedding.dimensions)
                .with_timeout(std::time::Duration::from_secs(config.embedding.timeout_secs));
            if let Some(base) = &config.embedding.base_url {
                provider = provider.with_base_url(base);
            }
            Arc::new(provider)
        }
        ("openai", None) => {
            tracing::warn!("no API key configured; using the offline hash embedder");
            Arc::new(HashEmbedder::new(config.embedding.dimensions))
        }
        _ => Arc::new(HashEmbedder::new(config.embedding.dimensions)),
    };

    Ok(ContextEngine::new(
        store,
        embedder,
        config.index.clone(),
        config.engine.clone(),
    ))
}
