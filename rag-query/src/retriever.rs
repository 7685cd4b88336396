//! Retriever capability and a vector-store backed implementation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::embedding::{EmbeddingProvider, mean_embedding};
use crate::error::{QueryError, Result};
use crate::node::ScoredNode;
use crate::query::QueryBundle;
use crate::vectorstore::VectorStore;

/// Fetches ranked evidence for a query.
///
/// Returning no matches is not an error: implementations return an empty
/// `Vec`. Backend failures (unreachable index, invalid query, quota) surface
/// as [`QueryError::RetrievalError`].
#[async_trait]
pub trait Retriever: Send + Sync {
    /// A short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Retrieve nodes for `bundle`, in retriever-defined order.
    async fn retrieve(&self, bundle: &QueryBundle) -> Result<Vec<ScoredNode>>;
}

/// A [`Retriever`] that embeds the bundle's embedding strings and searches a
/// [`VectorStore`].
///
/// When a bundle carries several embedding strings (for example after a HyDE
/// rewrite) their embeddings are averaged into a single query vector.
pub struct VectorRetriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    top_k: usize,
}

impl VectorRetriever {
    /// Create a retriever returning up to `top_k` nodes per query.
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
        top_k: usize,
    ) -> Self {
        Self { embedding_provider, vector_store, top_k }
    }

    fn failure(&self, message: String) -> QueryError {
        QueryError::RetrievalError { retriever: "vector".to_string(), message }
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    fn name(&self) -> &str {
        "vector"
    }

    async fn retrieve(&self, bundle: &QueryBundle) -> Result<Vec<ScoredNode>> {
        let texts: Vec<&str> = bundle.embedding_strs().iter().map(String::as_str).collect();
        if texts.is_empty() {
            return Err(self.failure("bundle has no embedding strings".to_string()));
        }

        let embeddings = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
            error!(error = %e, "query embedding failed");
            self.failure(format!("query embedding failed: {e}"))
        })?;

        let query_embedding = mean_embedding(&embeddings)
            .ok_or_else(|| self.failure("embeddings have inconsistent dimensions".to_string()))?;

        debug!(
            embedding_strs = texts.len(),
            store = self.vector_store.name(),
            top_k = self.top_k,
            "searching vector store"
        );

        self.vector_store.search(&query_embedding, self.top_k).await.map_err(|e| {
            error!(store = self.vector_store.name(), error = %e, "vector store search failed");
            self.failure(format!("search failed in '{}': {e}", self.vector_store.name()))
        })
    }
}
