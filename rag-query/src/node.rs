//! Data types for retrieved evidence and synthesized responses.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A retrieved unit of evidence paired with a relevance score.
///
/// Score scale is retriever-defined and not comparable across retrievers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredNode {
    /// Unique identifier for the node within its source index.
    pub id: String,
    /// The text payload.
    pub content: String,
    /// Relevance score (higher is more relevant).
    pub score: f32,
    /// Key-value metadata such as source identifiers and locations.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ScoredNode {
    /// Create a node with empty metadata.
    pub fn new(id: impl Into<String>, content: impl Into<String>, score: f32) -> Self {
        Self { id: id.into(), content: content.into(), score, metadata: HashMap::new() }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// The final answer returned to the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Response {
    /// The synthesized answer text.
    pub response: String,
    /// The nodes the answer was built from, plus any citation-only nodes.
    pub source_nodes: Vec<ScoredNode>,
}

impl Response {
    /// Create a response.
    pub fn new(response: impl Into<String>, source_nodes: Vec<ScoredNode>) -> Self {
        Self { response: response.into(), source_nodes }
    }

    /// Number of source nodes attached to the response.
    pub fn node_count(&self) -> usize {
        self.source_nodes.len()
    }

    /// Render the source nodes as a numbered citation list.
    pub fn format_sources(&self) -> String {
        self.source_nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let source = node.metadata.get("source").map(String::as_str).unwrap_or(&node.id);
                format!("[{}] {source} (score {:.3})", i + 1, node.score)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
