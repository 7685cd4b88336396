//! Embedding provider trait used by [`VectorRetriever`](crate::VectorRetriever).

use async_trait::async_trait;

use crate::error::Result;

/// A provider that turns text into vector embeddings.
///
/// The default [`embed_batch`](EmbeddingProvider::embed_batch) calls
/// [`embed`](EmbeddingProvider::embed) sequentially; backends with native
/// batching should override it.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs, in order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// Element-wise mean of `embeddings`.
///
/// Returns `None` for an empty input or when the vectors disagree on length.
pub fn mean_embedding(embeddings: &[Vec<f32>]) -> Option<Vec<f32>> {
    let first = embeddings.first()?;
    let dim = first.len();
    if embeddings.iter().any(|e| e.len() != dim) {
        return None;
    }

    let mut mean = vec![0.0f32; dim];
    for embedding in embeddings {
        for (acc, value) in mean.iter_mut().zip(embedding) {
            *acc += value;
        }
    }
    let n = embeddings.len() as f32;
    for value in &mut mean {
        *value /= n;
    }
    Some(mean)
}
