//! Error types for the `rag-query` crate.

use thiserror::Error;

use crate::engine::PipelineStage;

/// Errors that can occur while running a query through the pipeline.
///
/// Every variant identifies the stage it is attributed to via
/// [`QueryError::stage`], so callers can tell which part of the pipeline
/// failed without parsing messages.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The query transform could not produce a rewritten bundle.
    #[error("Transform error ({transform}): {message}")]
    TransformError {
        /// The transform that produced the error.
        transform: String,
        /// A description of the failure.
        message: String,
    },

    /// The retriever could not fetch candidate nodes.
    #[error("Retrieval error ({retriever}): {message}")]
    RetrievalError {
        /// The retriever that produced the error.
        retriever: String,
        /// A description of the failure.
        message: String,
    },

    /// The synthesizer could not produce a response.
    #[error("Synthesis error ({synthesizer}): {message}")]
    SynthesisError {
        /// The synthesizer that produced the error.
        synthesizer: String,
        /// A description of the failure.
        message: String,
    },

    /// The text-completion backend failed or timed out.
    #[error("Completion error ({service}): {message}")]
    CompletionError {
        /// The completion service that produced the error.
        service: String,
        /// A description of the failure.
        message: String,
    },

    /// The caller cancelled the pipeline while `stage` was in progress.
    #[error("Pipeline cancelled during {stage}")]
    Cancelled {
        /// The stage that observed the cancellation.
        stage: PipelineStage,
    },

    /// The pipeline was constructed or configured inconsistently.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl QueryError {
    /// The pipeline stage this failure is attributed to.
    ///
    /// [`ConfigError`](Self::ConfigError) carries no stage and always reports
    /// [`PipelineStage::Idle`], including a postprocessor chain that rejects
    /// its output at runtime; the [`PipelineObserver`] is told the actual
    /// stage through `on_failure`. A bare completion failure is attributed to
    /// [`PipelineStage::Transforming`], where completions are requested.
    ///
    /// [`PipelineObserver`]: crate::observer::PipelineObserver
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::TransformError { .. } | Self::CompletionError { .. } => {
                PipelineStage::Transforming
            }
            Self::RetrievalError { .. } => PipelineStage::Retrieving,
            Self::SynthesisError { .. } => PipelineStage::Synthesizing,
            Self::Cancelled { stage } => *stage,
            Self::ConfigError(_) => PipelineStage::Idle,
        }
    }

    /// Returns `true` if this error is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// A convenience result type for query pipeline operations.
pub type Result<T> = std::result::Result<T, QueryError>;
