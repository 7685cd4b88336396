//! In-memory vector store using cosine similarity.
//!
//! [`InMemoryVectorStore`] keeps nodes and their embeddings in a `Vec`
//! behind a `tokio::sync::RwLock`. It is meant for development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{QueryError, Result};
use crate::node::ScoredNode;
use crate::vectorstore::VectorStore;

#[derive(Debug, Clone)]
struct StoredNode {
    id: String,
    content: String,
    metadata: HashMap<String, String>,
    embedding: Vec<f32>,
}

/// An in-memory [`VectorStore`] scored by cosine similarity.
///
/// Inserting a node with an existing id replaces it.
///
/// # Example
///
/// ```rust,ignore
/// use rag_query::InMemoryVectorStore;
///
/// let store = InMemoryVectorStore::new();
/// store.insert("n1", "SPF lists the hosts allowed to send mail.", Default::default(), embedding).await;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    nodes: RwLock<Vec<StoredNode>>,
}

impl InMemoryVectorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a node.
    pub async fn insert(
        &self,
        id: impl Into<String>,
        content: impl Into<String>,
        metadata: HashMap<String, String>,
        embedding: Vec<f32>,
    ) {
        let node = StoredNode { id: id.into(), content: content.into(), metadata, embedding };
        let mut nodes = self.nodes.write().await;
        match nodes.iter_mut().find(|n| n.id == node.id) {
            Some(existing) => *existing = node,
            None => nodes.push(node),
        }
    }

    /// Number of stored nodes.
    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.nodes.read().await.is_empty()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &str {
        "InMemory"
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<ScoredNode>> {
        let nodes = self.nodes.read().await;

        if let Some(bad) = nodes.iter().find(|n| n.embedding.len() != embedding.len()) {
            return Err(QueryError::RetrievalError {
                retriever: "InMemory".to_string(),
                message: format!(
                    "query embedding has {} dimensions but node '{}' has {}",
                    embedding.len(),
                    bad.id,
                    bad.embedding.len()
                ),
            });
        }

        let mut scored: Vec<ScoredNode> = nodes
            .iter()
            .map(|n| ScoredNode {
                id: n.id.clone(),
                content: n.content.clone(),
                score: cosine_similarity(&n.embedding, embedding),
                metadata: n.metadata.clone(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }
}
