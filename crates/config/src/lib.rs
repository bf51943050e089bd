//! Configuration loading, validation, and management for Engram.
//!
//! Loads configuration from `~/.engram/config.toml` with environment
//! variable overrides. Validates all settings at startup, then hands out
//! the immutable `IndexConfig`/`EngineConfig` values the engine takes —
//! nothing downstream reads configuration from process globals.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use engram_core::{EngineConfig, IndexConfig};

/// The root configuration structure.
///
/// Maps directly to `~/.engram/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the embedding endpoint (env vars override).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Embedding provider settings.
    #[serde(default)]
    pub embedding: EmbeddingSettings,

    /// Storage backend settings.
    #[serde(default)]
    pub store: StoreSettings,

    /// Index building and chunking parameters.
    #[serde(default)]
    pub index: IndexConfig,

    /// Engine timeouts and resource bounds.
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Which embedding provider to use and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// "openai" for any OpenAI-compatible endpoint, "hash" for the
    /// deterministic offline provider.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Override the API base URL (self-hosted inference, proxies).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_embedding_provider() -> String {
    "openai".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_dimensions() -> usize {
    1536
}
fn default_embed_timeout_secs() -> u64 {
    30
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dimensions: default_dimensions(),
            base_url: None,
            timeout_secs: default_embed_timeout_secs(),
        }
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// "sqlite" or "memory".
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// Database file path; defaults to `~/.engram/engram.sqlite`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_store_backend() -> String {
    "sqlite".into()
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: None,
        }
    }
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("embedding", &self.embedding)
            .field("store", &self.store)
            .field("index", &self.index)
            .field("engine", &self.engine)
            .finish()
    }
}

impl AppConfig {
    /// Load from `~/.engram/config.toml`, then apply environment overrides:
    /// - `ENGRAM_API_KEY` (highest priority) or `OPENAI_API_KEY`
    /// - `ENGRAM_EMBEDDING_PROVIDER`
    /// - `ENGRAM_DB_PATH`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("ENGRAM_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }
        if let Ok(provider) = std::env::var("ENGRAM_EMBEDDING_PROVIDER") {
            config.embedding.provider = provider;
        }
        if let Ok(path) = std::env::var("ENGRAM_DB_PATH") {
            config.store.path = Some(PathBuf::from(path));
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".engram")
    }

    /// Resolved database path.
    pub fn db_path(&self) -> PathBuf {
        self.store
            .path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("engram.sqlite"))
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding.dimensions == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimensions must be positive".into(),
            ));
        }
        if !matches!(self.embedding.provider.as_str(), "openai" | "hash") {
            return Err(ConfigError::ValidationError(format!(
                "unknown embedding.provider '{}'; expected 'openai' or 'hash'",
                self.embedding.provider
            )));
        }
        if !matches!(self.store.backend.as_str(), "sqlite" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "unknown store.backend '{}'; expected 'sqlite' or 'memory'",
                self.store.backend
            )));
        }
        if self.index.max_index_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "index.max_index_tokens must be positive".into(),
            ));
        }
        if self.index.chunk_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "index.chunk_threshold must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.index.clustering_threshold) {
            return Err(ConfigError::ValidationError(
                "index.clustering_threshold must be within [0, 1]".into(),
            ));
        }
        if self.engine.search_limit <= 5_000 {
            return Err(ConfigError::ValidationError(
                "engine.search_limit must exceed 5000 or the hierarchical tier is unreachable".into(),
            ));
        }
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for first-run setup).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            embedding: EmbeddingSettings::default(),
            store: StoreSettings::default(),
            index: IndexConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.embedding.dimensions, 1536);
        assert_eq!(config.store.backend, "sqlite");
        assert_eq!(config.index.recent_window_size, 10);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.embedding.model, config.embedding.model);
        assert_eq!(parsed.index.max_index_tokens, config.index.max_index_tokens);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = AppConfig::load_from(Path::new("/definitely/not/here.toml")).unwrap();
        assert_eq!(config.embedding.provider, "openai");
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [embedding]
            provider = "hash"
            dimensions = 256

            [index]
            max_index_tokens = 4096
            "#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.embedding.provider, "hash");
        assert_eq!(config.embedding.dimensions, 256);
        assert_eq!(config.index.max_index_tokens, 4096);
        // Untouched sections keep their defaults.
        assert_eq!(config.store.backend, "sqlite");
        assert_eq!(config.index.min_cluster_size, 3);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [index]
            clustering_threshold = 1.5
            "#
        )
        .unwrap();
        assert!(matches!(
            AppConfig::load_from(file.path()),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [embedding]
            provider = "quantum"
            "#
        )
        .unwrap();
        assert!(AppConfig::load_from(file.path()).is_err());
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_is_parseable() {
        let toml_str = AppConfig::default_toml();
        assert!(!toml_str.is_empty());
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert!(parsed.validate().is_ok());
    }
}
