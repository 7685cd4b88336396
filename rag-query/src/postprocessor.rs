//! Node postprocessors: filter, reorder or annotate retrieved nodes.
//!
//! - [`SimilarityCutoff`]: drops nodes scoring below a threshold
//! - [`TopN`]: keeps the first `n` nodes
//! - [`KeywordBoost`]: raises scores of nodes containing query keywords and re-sorts
//!
//! Postprocessing is in-process work and never suspends, so the trait is
//! synchronous.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{QueryError, Result};
use crate::node::ScoredNode;
use crate::query::QueryBundle;

/// A single postprocessing step.
///
/// Implementations may drop, reorder or annotate nodes. They must not
/// introduce nodes that were not in their input.
pub trait NodePostprocessor: Send + Sync {
    /// A short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Process `nodes` for `bundle` (already transformed).
    fn postprocess(&self, nodes: Vec<ScoredNode>, bundle: &QueryBundle) -> Vec<ScoredNode>;
}

/// An ordered sequence of postprocessors applied strictly one after another.
#[derive(Clone, Default)]
pub struct NodePostprocessorChain {
    postprocessors: Vec<Arc<dyn NodePostprocessor>>,
}

impl NodePostprocessorChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a postprocessor.
    pub fn push(&mut self, postprocessor: Arc<dyn NodePostprocessor>) {
        self.postprocessors.push(postprocessor);
    }

    /// Append a postprocessor, builder style.
    pub fn with(mut self, postprocessor: Arc<dyn NodePostprocessor>) -> Self {
        self.push(postprocessor);
        self
    }

    /// Number of configured postprocessors.
    pub fn len(&self) -> usize {
        self.postprocessors.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.postprocessors.is_empty()
    }

    /// Names of the configured postprocessors, in order.
    pub fn names(&self) -> Vec<&str> {
        self.postprocessors.iter().map(|p| p.name()).collect()
    }

    /// Run every postprocessor in order; stage `i`'s output is stage `i + 1`'s
    /// only input.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::ConfigError`] if a postprocessor emits a node id
    /// that was not present in its input, or emits an id more often than it
    /// was given.
    pub fn apply(
        &self,
        mut nodes: Vec<ScoredNode>,
        bundle: &QueryBundle,
    ) -> Result<Vec<ScoredNode>> {
        for postprocessor in &self.postprocessors {
            let mut available: HashMap<String, usize> = HashMap::new();
            for node in &nodes {
                *available.entry(node.id.clone()).or_insert(0) += 1;
            }
            nodes = postprocessor.postprocess(nodes, bundle);
            for node in &nodes {
                match available.get_mut(&node.id) {
                    Some(remaining) if *remaining > 0 => *remaining -= 1,
                    Some(_) => {
                        return Err(QueryError::ConfigError(format!(
                            "postprocessor '{}' emitted node '{}' more times than it received it",
                            postprocessor.name(),
                            node.id
                        )));
                    }
                    None => {
                        return Err(QueryError::ConfigError(format!(
                            "postprocessor '{}' produced node '{}' that was not in its input",
                            postprocessor.name(),
                            node.id
                        )));
                    }
                }
            }
        }
        Ok(nodes)
    }
}

/// Drops nodes whose score is below `cutoff`.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityCutoff {
    cutoff: f32,
}

impl SimilarityCutoff {
    /// Keep nodes with `score >= cutoff`.
    pub fn new(cutoff: f32) -> Self {
        Self { cutoff }
    }
}

impl NodePostprocessor for SimilarityCutoff {
    fn name(&self) -> &str {
        "similarity_cutoff"
    }

    fn postprocess(&self, nodes: Vec<ScoredNode>, _bundle: &QueryBundle) -> Vec<ScoredNode> {
        nodes.into_iter().filter(|n| n.score >= self.cutoff).collect()
    }
}

/// Keeps the first `n` nodes in their current order.
#[derive(Debug, Clone, Copy)]
pub struct TopN {
    n: usize,
}

impl TopN {
    /// Keep at most `n` nodes.
    pub fn new(n: usize) -> Self {
        Self { n }
    }
}

impl NodePostprocessor for TopN {
    fn name(&self) -> &str {
        "top_n"
    }

    fn postprocess(&self, mut nodes: Vec<ScoredNode>, _bundle: &QueryBundle) -> Vec<ScoredNode> {
        nodes.truncate(self.n);
        nodes
    }
}

/// Adds `boost_per_keyword` to a node's score for every query keyword (longer
/// than three characters) found in its content, then sorts by descending
/// score.
#[derive(Debug, Clone, Copy)]
pub struct KeywordBoost {
    boost_per_keyword: f32,
}

impl KeywordBoost {
    /// Create a booster.
    pub fn new(boost_per_keyword: f32) -> Self {
        Self { boost_per_keyword }
    }
}

impl NodePostprocessor for KeywordBoost {
    fn name(&self) -> &str {
        "keyword_boost"
    }

    fn postprocess(&self, mut nodes: Vec<ScoredNode>, bundle: &QueryBundle) -> Vec<ScoredNode> {
        let keywords: Vec<String> = bundle
            .query_str()
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| w.len() > 3)
            .collect();

        for node in &mut nodes {
            let content = node.content.to_lowercase();
            let matches = keywords.iter().filter(|kw| content.contains(kw.as_str())).count();
            node.score += matches as f32 * self.boost_per_keyword;
        }

        nodes.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        nodes
    }
}
