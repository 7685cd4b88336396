//! Text-completion capability consumed by the HyDE transform and the
//! completion synthesizer.

use async_trait::async_trait;

use crate::error::Result;
use crate::prompt::PromptTemplate;

/// An opaque text-completion backend.
///
/// Implementations own their timeout and retry policy. A backend error or
/// timeout must surface as [`QueryError::CompletionError`](crate::QueryError::CompletionError);
/// callers never retry on their own.
///
/// # Example
///
/// ```rust,ignore
/// use rag_query::{CompletionService, PromptTemplate};
///
/// let passage = service.complete(&PromptTemplate::hyde(), "What is SPF?").await?;
/// ```
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// A short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Fill `template` with `context` and return the model's completion.
    async fn complete(&self, template: &PromptTemplate, context: &str) -> Result<String>;

    /// Complete an already rendered prompt.
    ///
    /// Used when the caller fills several placeholders itself. The default
    /// implementation sends `prompt` through [`complete`](CompletionService::complete)
    /// with a pass-through template.
    async fn complete_prompt(&self, prompt: &str) -> Result<String> {
        self.complete(&PromptTemplate::new(crate::prompt::CONTEXT_PLACEHOLDER), prompt).await
    }
}
