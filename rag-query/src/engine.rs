//! Query engine orchestrator.
//!
//! [`TransformQueryEngine`] runs transform → retrieve → postprocess →
//! synthesize for one query. Every operation has a single async
//! implementation; the `*_blocking` variants drive that same future on the
//! calling thread, so both conventions behave identically.
//!
//! # Example
//!
//! ```rust,ignore
//! use rag_query::{QueryEngineConfig, TransformQueryEngine};
//!
//! let engine = TransformQueryEngine::builder()
//!     .config(QueryEngineConfig::builder().similarity_cutoff(0.5).build()?)
//!     .hyde(Arc::new(completion))
//!     .retriever(Arc::new(retriever))
//!     .synthesizer(Arc::new(synthesizer))
//!     .build()?;
//!
//! let response = engine.query("What is SPF?").await?;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::blocking::block_on;
use crate::cancel::CancellationToken;
use crate::completion::CompletionService;
use crate::config::QueryEngineConfig;
use crate::error::{QueryError, Result};
use crate::hyde::HydeTransform;
use crate::node::{Response, ScoredNode};
use crate::observer::{PipelineObserver, TracingObserver};
use crate::postprocessor::{NodePostprocessor, NodePostprocessorChain, SimilarityCutoff, TopN};
use crate::query::{QueryBundle, TransformMetadata};
use crate::retriever::Retriever;
use crate::synthesizer::Synthesizer;
use crate::transform::{IdentityTransform, QueryTransform};

/// Lifecycle of a single engine invocation.
///
/// `Idle → Transforming → Retrieving → Postprocessing → Synthesizing → Done`,
/// with `Failed` reachable from any non-terminal stage. Operations that skip
/// stages (for example [`TransformQueryEngine::retrieve`]) go straight from
/// their last stage to `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Not started.
    Idle,
    /// Running the query transform.
    Transforming,
    /// Waiting on the retriever.
    Retrieving,
    /// Applying the postprocessor chain.
    Postprocessing,
    /// Waiting on the synthesizer.
    Synthesizing,
    /// Finished successfully.
    Done,
    /// Aborted by an error or cancellation.
    Failed,
}

impl PipelineStage {
    /// Whether no further transitions can happen.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Transforming => "transforming",
            Self::Retrieving => "retrieving",
            Self::Postprocessing => "postprocessing",
            Self::Synthesizing => "synthesizing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call state: current stage, cancellation signal and observer.
struct Invocation<'a> {
    stage: PipelineStage,
    observer: &'a dyn PipelineObserver,
    cancel: &'a CancellationToken,
}

impl<'a> Invocation<'a> {
    fn new(observer: &'a dyn PipelineObserver, cancel: &'a CancellationToken) -> Self {
        Self { stage: PipelineStage::Idle, observer, cancel }
    }

    fn enter(&mut self, next: PipelineStage) {
        self.observer.on_transition(self.stage, next);
        self.stage = next;
    }

    fn cancelled(&self) -> QueryError {
        QueryError::Cancelled { stage: self.stage }
    }

    /// Await an external call, abandoning it if the token fires first. The
    /// token is checked again once the call returns so a cancellation that
    /// raced a successful call is still honoured.
    async fn suspend<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        if self.cancel.is_cancelled() {
            return Err(self.cancelled());
        }
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(self.cancelled()),
            result = call => result,
        };
        if self.cancel.is_cancelled() {
            return Err(self.cancelled());
        }
        result
    }

    fn finish<T>(mut self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.enter(PipelineStage::Done);
                Ok(value)
            }
            Err(e) => {
                self.observer.on_failure(self.stage, &e);
                self.enter(PipelineStage::Failed);
                Err(e)
            }
        }
    }
}

/// Re-label a collaborator error as the failure of `stage`, keeping errors
/// that already carry the right classification.
fn stage_failure(stage: PipelineStage, name: &str, error: QueryError) -> QueryError {
    match (stage, error) {
        (_, e @ QueryError::Cancelled { .. }) => e,
        (PipelineStage::Transforming, e @ QueryError::TransformError { .. }) => e,
        (PipelineStage::Retrieving, e @ QueryError::RetrievalError { .. }) => e,
        (PipelineStage::Synthesizing, e @ QueryError::SynthesisError { .. }) => e,
        (PipelineStage::Transforming, e) => {
            QueryError::TransformError { transform: name.to_string(), message: e.to_string() }
        }
        (PipelineStage::Retrieving, e) => {
            QueryError::RetrievalError { retriever: name.to_string(), message: e.to_string() }
        }
        (PipelineStage::Synthesizing, e) => {
            QueryError::SynthesisError { synthesizer: name.to_string(), message: e.to_string() }
        }
        (_, e) => e,
    }
}

/// Transform → retrieve → postprocess → synthesize orchestrator.
///
/// The engine holds no per-query mutable state: concurrent calls share the
/// stage objects read-only and each call owns its bundle and nodes. Every
/// stage failure aborts the call; nothing is retried.
pub struct TransformQueryEngine {
    transform: Arc<dyn QueryTransform>,
    transform_metadata: TransformMetadata,
    retriever: Arc<dyn Retriever>,
    postprocessors: NodePostprocessorChain,
    synthesizer: Arc<dyn Synthesizer>,
    observer: Arc<dyn PipelineObserver>,
}

impl TransformQueryEngine {
    /// Create a new [`TransformQueryEngineBuilder`].
    pub fn builder() -> TransformQueryEngineBuilder {
        TransformQueryEngineBuilder::default()
    }

    /// The metadata passed to the transform on every engine-driven call.
    pub fn transform_metadata(&self) -> &TransformMetadata {
        &self.transform_metadata
    }

    /// The postprocessor chain applied by [`query`](Self::query).
    pub fn postprocessors(&self) -> &NodePostprocessorChain {
        &self.postprocessors
    }

    // ── stage steps ────────────────────────────────────────────────

    async fn transform_step(
        &self,
        run: &mut Invocation<'_>,
        bundle: &QueryBundle,
        metadata: &TransformMetadata,
    ) -> Result<QueryBundle> {
        run.enter(PipelineStage::Transforming);
        run.suspend(self.transform.transform(bundle, metadata))
            .await
            .map_err(|e| stage_failure(PipelineStage::Transforming, self.transform.name(), e))
    }

    async fn retrieve_step(
        &self,
        run: &mut Invocation<'_>,
        bundle: &QueryBundle,
    ) -> Result<Vec<ScoredNode>> {
        run.enter(PipelineStage::Retrieving);
        if bundle.query_str().is_empty() {
            return Err(QueryError::RetrievalError {
                retriever: self.retriever.name().to_string(),
                message: "query string must not be empty".to_string(),
            });
        }
        let nodes = run
            .suspend(self.retriever.retrieve(bundle))
            .await
            .map_err(|e| stage_failure(PipelineStage::Retrieving, self.retriever.name(), e))?;
        run.observer.on_nodes(PipelineStage::Retrieving, nodes.len());
        Ok(nodes)
    }

    fn postprocess_step(
        &self,
        run: &mut Invocation<'_>,
        nodes: Vec<ScoredNode>,
        bundle: &QueryBundle,
    ) -> Result<Vec<ScoredNode>> {
        run.enter(PipelineStage::Postprocessing);
        let nodes = self.postprocessors.apply(nodes, bundle)?;
        run.observer.on_nodes(PipelineStage::Postprocessing, nodes.len());
        Ok(nodes)
    }

    async fn synthesize_step(
        &self,
        run: &mut Invocation<'_>,
        bundle: &QueryBundle,
        nodes: Vec<ScoredNode>,
        additional_source_nodes: Vec<ScoredNode>,
    ) -> Result<Response> {
        run.enter(PipelineStage::Synthesizing);
        run.suspend(self.synthesizer.synthesize(bundle, nodes, additional_source_nodes))
            .await
            .map_err(|e| stage_failure(PipelineStage::Synthesizing, self.synthesizer.name(), e))
    }

    // ── async operations ───────────────────────────────────────────

    /// Transform the bundle and return the retriever's raw nodes (no
    /// postprocessing).
    pub async fn retrieve(&self, bundle: impl Into<QueryBundle>) -> Result<Vec<ScoredNode>> {
        self.retrieve_with_cancellation(bundle, &CancellationToken::new()).await
    }

    /// [`retrieve`](Self::retrieve), observing `cancel` at each suspension point.
    pub async fn retrieve_with_cancellation(
        &self,
        bundle: impl Into<QueryBundle>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoredNode>> {
        let bundle = bundle.into();
        let mut run = Invocation::new(self.observer.as_ref(), cancel);
        let result = async {
            let bundle = self.transform_step(&mut run, &bundle, &self.transform_metadata).await?;
            self.retrieve_step(&mut run, &bundle).await
        }
        .await;
        run.finish(result)
    }

    /// Transform the bundle and synthesize a response from `nodes`.
    ///
    /// `additional_source_nodes` are attached for citation only; they are
    /// not postprocessed.
    pub async fn synthesize(
        &self,
        bundle: impl Into<QueryBundle>,
        nodes: Vec<ScoredNode>,
        additional_source_nodes: Vec<ScoredNode>,
    ) -> Result<Response> {
        self.synthesize_with_cancellation(
            bundle,
            nodes,
            additional_source_nodes,
            &CancellationToken::new(),
        )
        .await
    }

    /// [`synthesize`](Self::synthesize), observing `cancel` at each suspension point.
    pub async fn synthesize_with_cancellation(
        &self,
        bundle: impl Into<QueryBundle>,
        nodes: Vec<ScoredNode>,
        additional_source_nodes: Vec<ScoredNode>,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        let bundle = bundle.into();
        let mut run = Invocation::new(self.observer.as_ref(), cancel);
        let result = async {
            let bundle = self.transform_step(&mut run, &bundle, &self.transform_metadata).await?;
            self.synthesize_step(&mut run, &bundle, nodes, additional_source_nodes).await
        }
        .await;
        run.finish(result)
    }

    /// Normalize `input` and return the transformed bundle without
    /// retrieving or synthesizing.
    ///
    /// `metadata` overrides the engine's transform metadata for this call.
    pub async fn run_transform(
        &self,
        input: impl Into<QueryBundle>,
        metadata: Option<&TransformMetadata>,
    ) -> Result<QueryBundle> {
        self.run_transform_with_cancellation(input, metadata, &CancellationToken::new()).await
    }

    /// [`run_transform`](Self::run_transform), observing `cancel`.
    pub async fn run_transform_with_cancellation(
        &self,
        input: impl Into<QueryBundle>,
        metadata: Option<&TransformMetadata>,
        cancel: &CancellationToken,
    ) -> Result<QueryBundle> {
        let bundle = input.into();
        let metadata = metadata.unwrap_or(&self.transform_metadata);
        let mut run = Invocation::new(self.observer.as_ref(), cancel);
        let result = self.transform_step(&mut run, &bundle, metadata).await;
        run.finish(result)
    }

    /// Answer a query end to end: transform, retrieve, postprocess, synthesize.
    pub async fn query(&self, input: impl Into<QueryBundle>) -> Result<Response> {
        self.query_with_cancellation(input, &CancellationToken::new()).await
    }

    /// [`query`](Self::query), observing `cancel` at each suspension point.
    pub async fn query_with_cancellation(
        &self,
        input: impl Into<QueryBundle>,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        let bundle = input.into();
        let mut run = Invocation::new(self.observer.as_ref(), cancel);
        let result = async {
            let bundle = self.transform_step(&mut run, &bundle, &self.transform_metadata).await?;
            let nodes = self.retrieve_step(&mut run, &bundle).await?;
            let nodes = self.postprocess_step(&mut run, nodes, &bundle)?;
            self.synthesize_step(&mut run, &bundle, nodes, Vec::new()).await
        }
        .await;
        run.finish(result)
    }

    // ── blocking operations ────────────────────────────────────────

    /// Blocking form of [`retrieve`](Self::retrieve).
    ///
    /// # Errors
    ///
    /// In addition to stage failures, returns [`QueryError::ConfigError`]
    /// when called from inside an async runtime.
    pub fn retrieve_blocking(&self, bundle: impl Into<QueryBundle>) -> Result<Vec<ScoredNode>> {
        block_on(self.retrieve(bundle))
    }

    /// Blocking form of [`retrieve_with_cancellation`](Self::retrieve_with_cancellation).
    pub fn retrieve_blocking_with_cancellation(
        &self,
        bundle: impl Into<QueryBundle>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoredNode>> {
        block_on(self.retrieve_with_cancellation(bundle, cancel))
    }

    /// Blocking form of [`synthesize`](Self::synthesize).
    pub fn synthesize_blocking(
        &self,
        bundle: impl Into<QueryBundle>,
        nodes: Vec<ScoredNode>,
        additional_source_nodes: Vec<ScoredNode>,
    ) -> Result<Response> {
        block_on(self.synthesize(bundle, nodes, additional_source_nodes))
    }

    /// Blocking form of [`synthesize_with_cancellation`](Self::synthesize_with_cancellation).
    pub fn synthesize_blocking_with_cancellation(
        &self,
        bundle: impl Into<QueryBundle>,
        nodes: Vec<ScoredNode>,
        additional_source_nodes: Vec<ScoredNode>,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        block_on(self.synthesize_with_cancellation(bundle, nodes, additional_source_nodes, cancel))
    }

    /// Blocking form of [`run_transform`](Self::run_transform).
    pub fn run_transform_blocking(
        &self,
        input: impl Into<QueryBundle>,
        metadata: Option<&TransformMetadata>,
    ) -> Result<QueryBundle> {
        block_on(self.run_transform(input, metadata))
    }

    /// Blocking form of
    /// [`run_transform_with_cancellation`](Self::run_transform_with_cancellation).
    pub fn run_transform_blocking_with_cancellation(
        &self,
        input: impl Into<QueryBundle>,
        metadata: Option<&TransformMetadata>,
        cancel: &CancellationToken,
    ) -> Result<QueryBundle> {
        block_on(self.run_transform_with_cancellation(input, metadata, cancel))
    }

    /// Blocking form of [`query`](Self::query).
    pub fn query_blocking(&self, input: impl Into<QueryBundle>) -> Result<Response> {
        block_on(self.query(input))
    }

    /// Blocking form of [`query_with_cancellation`](Self::query_with_cancellation).
    pub fn query_blocking_with_cancellation(
        &self,
        input: impl Into<QueryBundle>,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        block_on(self.query_with_cancellation(input, cancel))
    }
}

/// Builder for constructing a [`TransformQueryEngine`].
///
/// `retriever` and `synthesizer` are required. Without a transform the
/// engine uses [`IdentityTransform`]; [`hyde`](Self::hyde) installs a
/// [`HydeTransform`] honouring `config.include_original`. The configured
/// similarity cutoff and top-n run after any user postprocessors, in that
/// order.
#[derive(Default)]
pub struct TransformQueryEngineBuilder {
    config: Option<QueryEngineConfig>,
    transform: Option<Arc<dyn QueryTransform>>,
    hyde_completion: Option<Arc<dyn CompletionService>>,
    transform_metadata: TransformMetadata,
    retriever: Option<Arc<dyn Retriever>>,
    postprocessors: Vec<Arc<dyn NodePostprocessor>>,
    synthesizer: Option<Arc<dyn Synthesizer>>,
    observer: Option<Arc<dyn PipelineObserver>>,
}

impl TransformQueryEngineBuilder {
    /// Set the engine configuration.
    pub fn config(mut self, config: QueryEngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the query transform.
    pub fn transform(mut self, transform: Arc<dyn QueryTransform>) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Use a [`HydeTransform`] backed by `completion`.
    pub fn hyde(mut self, completion: Arc<dyn CompletionService>) -> Self {
        self.hyde_completion = Some(completion);
        self
    }

    /// Set the metadata passed to the transform.
    pub fn transform_metadata(mut self, metadata: TransformMetadata) -> Self {
        self.transform_metadata = metadata;
        self
    }

    /// Set the retriever.
    pub fn retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Append a postprocessor to the chain.
    pub fn postprocessor(mut self, postprocessor: Arc<dyn NodePostprocessor>) -> Self {
        self.postprocessors.push(postprocessor);
        self
    }

    /// Set the synthesizer.
    pub fn synthesizer(mut self, synthesizer: Arc<dyn Synthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Set the observability sink. Defaults to [`TracingObserver`].
    pub fn observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Build the [`TransformQueryEngine`].
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::ConfigError`] if:
    /// - `retriever` or `synthesizer` is missing
    /// - both `transform` and `hyde` were set
    /// - the configuration fails [`QueryEngineConfig::validate`]
    pub fn build(self) -> Result<TransformQueryEngine> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let retriever = self
            .retriever
            .ok_or_else(|| QueryError::ConfigError("retriever is required".to_string()))?;
        let synthesizer = self
            .synthesizer
            .ok_or_else(|| QueryError::ConfigError("synthesizer is required".to_string()))?;

        let transform: Arc<dyn QueryTransform> = match (self.transform, self.hyde_completion) {
            (Some(_), Some(_)) => {
                return Err(QueryError::ConfigError(
                    "configure either a transform or hyde, not both".to_string(),
                ));
            }
            (Some(transform), None) => transform,
            (None, Some(completion)) => {
                Arc::new(HydeTransform::new(completion).include_original(config.include_original))
            }
            (None, None) => Arc::new(IdentityTransform),
        };

        let mut postprocessors = NodePostprocessorChain::new();
        for postprocessor in self.postprocessors {
            postprocessors.push(postprocessor);
        }
        if let Some(cutoff) = config.similarity_cutoff {
            postprocessors.push(Arc::new(SimilarityCutoff::new(cutoff)));
        }
        if let Some(n) = config.top_n {
            postprocessors.push(Arc::new(TopN::new(n)));
        }

        Ok(TransformQueryEngine {
            transform,
            transform_metadata: self.transform_metadata,
            retriever,
            postprocessors,
            synthesizer,
            observer: self.observer.unwrap_or_else(|| Arc::new(TracingObserver)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display_and_terminal() {
        assert_eq!(PipelineStage::Postprocessing.to_string(), "postprocessing");
        assert!(PipelineStage::Done.is_terminal());
        assert!(PipelineStage::Failed.is_terminal());
        assert!(!PipelineStage::Retrieving.is_terminal());
    }

    #[test]
    fn test_stage_failure_wraps_foreign_errors() {
        let err = stage_failure(
            PipelineStage::Retrieving,
            "index",
            QueryError::CompletionError { service: "llm".into(), message: "timeout".into() },
        );
        match err {
            QueryError::RetrievalError { retriever, message } => {
                assert_eq!(retriever, "index");
                assert!(message.contains("timeout"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_stage_failure_keeps_cancellation() {
        let err = stage_failure(
            PipelineStage::Synthesizing,
            "s",
            QueryError::Cancelled { stage: PipelineStage::Synthesizing },
        );
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_build_requires_retriever() {
        let err = TransformQueryEngine::builder().build().err().unwrap();
        assert!(err.to_string().contains("retriever"));
    }
}
