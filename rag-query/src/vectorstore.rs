//! Vector store trait searched by [`VectorRetriever`](crate::VectorRetriever).

use async_trait::async_trait;

use crate::error::Result;
use crate::node::ScoredNode;

/// A similarity-search backend over embedded nodes.
///
/// Index construction and ingestion are the backend's business; the query
/// pipeline only searches. A search with no matches returns an empty `Vec`.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// A short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Return up to `top_k` nodes most similar to `embedding`, ordered by
    /// descending score.
    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<ScoredNode>>;
}
