//! Order-preserving batched embedding.
//!
//! Chunk sets can be large; providers cap request sizes. This wrapper
//! splits any input into provider-sized batches and runs them with bounded
//! concurrency, reassembling results in input order. Chunk embeddings for
//! one logical entity are all generated here before any chunk is persisted.

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;

use engram_core::{EmbeddingError, EmbeddingProvider};

/// Wraps any provider with batch splitting and bounded concurrency.
pub struct BatchingEmbedder {
    inner: Arc<dyn EmbeddingProvider>,
    max_batch: usize,
    max_concurrency: usize,
}

impl BatchingEmbedder {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, max_batch: usize, max_concurrency: usize) -> Self {
        Self {
            inner,
            max_batch: max_batch.max(1),
            max_concurrency: max_concurrency.max(1),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for BatchingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.len() <= self.max_batch {
            return self.inner.embed_batch(texts).await;
        }

        let batches: Vec<Vec<String>> = texts
            .chunks(self.max_batch)
            .map(|c| c.to_vec())
            .collect();

        // `buffered` polls up to max_concurrency requests at once and yields
        // results in submission order, so the flattened output lines up with
        // the input.
        let results: Vec<Vec<Vec<f32>>> = stream::iter(batches)
            .map(|batch| {
                let inner = Arc::clone(&self.inner);
                async move { inner.embed_batch(&batch).await }
            })
            .buffered(self.max_concurrency)
            .try_collect()
            .await?;

        Ok(results.into_iter().flatten().collect())
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::HashEmbedder;

    #[tokio::test]
    async fn splits_large_inputs_and_preserves_order() {
        let inner = Arc::new(HashEmbedder::new(32));
        let batcher = BatchingEmbedder::new(Arc::clone(&inner) as Arc<dyn EmbeddingProvider>, 4, 2);

        let texts: Vec<String> = (0..11).map(|i| format!("text number {i}")).collect();
        let batched = batcher.embed_batch(&texts).await.unwrap();
        let direct = inner.embed_batch(&texts).await.unwrap();

        assert_eq!(batched.len(), 11);
        assert_eq!(batched, direct);
    }

    #[tokio::test]
    async fn small_inputs_pass_through() {
        let inner = Arc::new(HashEmbedder::new(16));
        let batcher = BatchingEmbedder::new(inner, 8, 2);
        let texts = vec!["a".to_string(), "b".to_string()];
        assert_eq!(batcher.embed_batch(&texts).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_input_is_empty_output() {
        let inner = Arc::new(HashEmbedder::new(16));
        let batcher = BatchingEmbedder::new(inner, 8, 2);
        assert!(batcher.embed_batch(&[]).await.unwrap().is_empty());
    }
}
