//! EmbeddingProvider trait — the seam to the embedding model.
//!
//! The model itself is an external collaborator. Engram only needs
//! text → fixed-dimension vector, with batching for chunk sets.

use async_trait::async_trait;

use crate::error::EmbeddingError;

/// The embedding generation contract.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed a batch of texts, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// The fixed output dimensionality (default deployments use 1536).
    fn dimensions(&self) -> usize;

    /// The model identifier, for logging and stats.
    fn model_name(&self) -> &str;
}
