//! Hypothetical Document Embeddings (HyDE).
//!
//! Asks a completion model for a plausible answer passage and embeds that
//! passage instead of, or ahead of, the question. An answer-shaped string sits
//! closer to answer-bearing documents in embedding space than the question
//! does, even when the generated passage is factually wrong.
//!
//! See Gao et al., *Precise Zero-Shot Dense Retrieval without Relevance Labels*
//! (<https://arxiv.org/abs/2212.10496>).

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::completion::CompletionService;
use crate::error::{QueryError, Result};
use crate::prompt::PromptTemplate;
use crate::query::{QueryBundle, TransformMetadata};
use crate::transform::QueryTransform;

/// Key under which the HyDE prompt is exposed by [`HydeTransform::prompts`].
pub const HYDE_PROMPT_KEY: &str = "hyde_prompt";

/// A [`QueryTransform`] that prepends one hypothetical answer passage to the
/// bundle's embedding strings.
///
/// The output keeps `query_str` unchanged. Its `embedding_strs` start with
/// the generated passage, followed by the input's embedding strings when
/// `include_original` is set.
///
/// Exactly one passage is generated per call.
///
/// # Example
///
/// ```rust,ignore
/// use rag_query::HydeTransform;
///
/// let hyde = HydeTransform::new(Arc::new(completion_service)).include_original(false);
/// let rewritten = hyde.transform(&"What is SPF?".into(), &Default::default()).await?;
/// ```
#[derive(Clone)]
pub struct HydeTransform {
    completion: Arc<dyn CompletionService>,
    prompt: PromptTemplate,
    include_original: bool,
}

impl HydeTransform {
    /// Create a transform using the default HyDE prompt, keeping the
    /// original embedding strings.
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion, prompt: PromptTemplate::hyde(), include_original: true }
    }

    /// Use a custom prompt. It must contain `{context_str}`.
    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    /// Whether to keep the input's embedding strings after the passage.
    pub fn include_original(mut self, include: bool) -> Self {
        self.include_original = include;
        self
    }

    /// The prompts this transform uses, keyed by name.
    pub fn prompts(&self) -> Vec<(&'static str, &PromptTemplate)> {
        vec![(HYDE_PROMPT_KEY, &self.prompt)]
    }

    /// Replace the prompt stored under `key`. Unknown keys are ignored.
    pub fn update_prompt(&mut self, key: &str, prompt: PromptTemplate) {
        if key == HYDE_PROMPT_KEY {
            self.prompt = prompt;
        }
    }

    fn failure(&self, message: String) -> QueryError {
        QueryError::TransformError { transform: "hyde".to_string(), message }
    }
}

#[async_trait]
impl QueryTransform for HydeTransform {
    fn name(&self) -> &str {
        "hyde"
    }

    async fn transform(
        &self,
        bundle: &QueryBundle,
        _metadata: &TransformMetadata,
    ) -> Result<QueryBundle> {
        let query_str = bundle.query_str();

        // Reject a malformed template before spending a completion call.
        self.prompt
            .render(query_str)
            .map_err(|e| self.failure(format!("invalid prompt template: {e}")))?;

        let hypothetical_doc =
            self.completion.complete(&self.prompt, query_str).await.map_err(|e| {
                error!(service = self.completion.name(), error = %e, "hypothetical document generation failed");
                self.failure(format!("completion failed: {e}"))
            })?;

        debug!(
            service = self.completion.name(),
            doc_len = hypothetical_doc.len(),
            include_original = self.include_original,
            "generated hypothetical document"
        );

        let mut embedding_strs = vec![hypothetical_doc];
        if self.include_original {
            embedding_strs.extend(bundle.embedding_strs().iter().cloned());
        }

        Ok(QueryBundle::with_embedding_strs(query_str, embedding_strs))
    }
}
