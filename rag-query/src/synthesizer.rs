//! Response synthesis from a query and retrieved nodes.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::completion::CompletionService;
use crate::error::{QueryError, Result};
use crate::node::{Response, ScoredNode};
use crate::prompt::PromptTemplate;
use crate::query::QueryBundle;

/// Produces the final answer from a query and its evidence.
///
/// `additional_source_nodes` are for citation only: they are attached to the
/// response's sources but are not used to generate the answer.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// A short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Build a [`Response`] for `bundle` from `nodes`.
    async fn synthesize(
        &self,
        bundle: &QueryBundle,
        nodes: Vec<ScoredNode>,
        additional_source_nodes: Vec<ScoredNode>,
    ) -> Result<Response>;
}

/// Separator between node texts in the rendered context.
const NODE_SEPARATOR: &str = "\n\n";

/// A [`Synthesizer`] that stuffs every node into one question-answering prompt
/// and asks a [`CompletionService`] for the answer.
pub struct CompletionSynthesizer {
    completion: Arc<dyn CompletionService>,
    prompt: PromptTemplate,
}

impl CompletionSynthesizer {
    /// Create a synthesizer using the default text-QA prompt.
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion, prompt: PromptTemplate::text_qa() }
    }

    /// Use a custom prompt. It must contain `{context_str}` and `{query_str}`.
    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    fn failure(&self, message: String) -> QueryError {
        QueryError::SynthesisError { synthesizer: "completion".to_string(), message }
    }
}

#[async_trait]
impl Synthesizer for CompletionSynthesizer {
    fn name(&self) -> &str {
        "completion"
    }

    async fn synthesize(
        &self,
        bundle: &QueryBundle,
        nodes: Vec<ScoredNode>,
        additional_source_nodes: Vec<ScoredNode>,
    ) -> Result<Response> {
        let context =
            nodes.iter().map(|n| n.content.as_str()).collect::<Vec<_>>().join(NODE_SEPARATOR);

        let prompt = self
            .prompt
            .render_with_query(&context, bundle.query_str())
            .map_err(|e| self.failure(format!("invalid prompt template: {e}")))?;

        debug!(node_count = nodes.len(), prompt_len = prompt.len(), "synthesizing answer");

        let answer = self.completion.complete_prompt(&prompt).await.map_err(|e| {
            error!(service = self.completion.name(), error = %e, "answer generation failed");
            self.failure(format!("completion failed: {e}"))
        })?;

        let mut source_nodes = nodes;
        source_nodes.extend(additional_source_nodes);
        Ok(Response::new(answer.trim(), source_nodes))
    }
}
