//! Prompt templates used by the HyDE transform and the completion synthesizer.

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};

/// Placeholder for the context string (the query for HyDE, node text for QA).
pub const CONTEXT_PLACEHOLDER: &str = "{context_str}";

/// Placeholder for the user's question.
pub const QUERY_PLACEHOLDER: &str = "{query_str}";

/// Default prompt asking the model for a passage that answers the question.
pub const DEFAULT_HYDE_PROMPT: &str = "Please write a passage to answer the question\n\
Try to include as many key details as possible.\n\
\n\
\n\
{context_str}\n\
\n\
\n\
Passage:";

/// Default prompt for answering a question from retrieved context.
pub const DEFAULT_TEXT_QA_PROMPT: &str = "Context information is below.\n\
---------------------\n\
{context_str}\n\
---------------------\n\
Given the context information and not prior knowledge, answer the query.\n\
Query: {query_str}\n\
Answer: ";

/// A text template with `{context_str}` and optional `{query_str}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Wrap a template string.
    pub fn new(template: impl Into<String>) -> Self {
        Self { template: template.into() }
    }

    /// The default HyDE prompt.
    pub fn hyde() -> Self {
        Self::new(DEFAULT_HYDE_PROMPT)
    }

    /// The default question-answering prompt.
    pub fn text_qa() -> Self {
        Self::new(DEFAULT_TEXT_QA_PROMPT)
    }

    /// The raw template text.
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Whether the template contains `placeholder`.
    pub fn has_placeholder(&self, placeholder: &str) -> bool {
        self.template.contains(placeholder)
    }

    /// Fill `{context_str}`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::ConfigError`] if the template has no
    /// `{context_str}` placeholder.
    pub fn render(&self, context: &str) -> Result<String> {
        self.require(CONTEXT_PLACEHOLDER)?;
        Ok(self.template.replace(CONTEXT_PLACEHOLDER, context))
    }

    /// Fill both `{context_str}` and `{query_str}`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::ConfigError`] if either placeholder is missing.
    pub fn render_with_query(&self, context: &str, query: &str) -> Result<String> {
        self.require(CONTEXT_PLACEHOLDER)?;
        self.require(QUERY_PLACEHOLDER)?;
        // Single pass over the template; substituted text is never rescanned.
        let mut rendered = String::with_capacity(self.template.len() + context.len() + query.len());
        let mut rest = self.template.as_str();
        while let Some(start) = rest.find('{') {
            rendered.push_str(&rest[..start]);
            let tail = &rest[start..];
            if let Some(after) = tail.strip_prefix(CONTEXT_PLACEHOLDER) {
                rendered.push_str(context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(QUERY_PLACEHOLDER) {
                rendered.push_str(query);
                rest = after;
            } else {
                rendered.push('{');
                rest = &tail[1..];
            }
        }
        rendered.push_str(rest);
        Ok(rendered)
    }

    fn require(&self, placeholder: &str) -> Result<()> {
        if self.has_placeholder(placeholder) {
            Ok(())
        } else {
            Err(QueryError::ConfigError(format!("prompt template is missing {placeholder}")))
        }
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::hyde()
    }
}

impl From<&str> for PromptTemplate {
    fn from(template: &str) -> Self {
        Self::new(template)
    }
}
