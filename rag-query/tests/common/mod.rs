//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rag_query::{
    CancellationToken, CompletionService, PipelineObserver, PipelineStage, PromptTemplate,
    QueryBundle, QueryError, Response, Result, Retriever, ScoredNode, Synthesizer,
};

pub fn node(id: &str, score: f32) -> ScoredNode {
    ScoredNode::new(id, format!("content of {id}"), score)
}

/// Completion double returning a fixed reply or a fixed failure.
pub struct FixedCompletion {
    reply: Option<String>,
    calls: AtomicUsize,
}

impl FixedCompletion {
    pub fn replying(reply: &str) -> Self {
        Self { reply: Some(reply.to_string()), calls: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        Self { reply: None, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionService for FixedCompletion {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn complete(&self, template: &PromptTemplate, context: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        template.render(context)?;
        self.reply.clone().ok_or_else(|| QueryError::CompletionError {
            service: "fixed".into(),
            message: "backend timed out".into(),
        })
    }
}

/// Retriever double returning a fixed node list and recording the bundles it saw.
pub struct StaticRetriever {
    nodes: Vec<ScoredNode>,
    calls: AtomicUsize,
    seen: Mutex<Vec<QueryBundle>>,
}

impl StaticRetriever {
    pub fn new(nodes: Vec<ScoredNode>) -> Self {
        Self { nodes, calls: AtomicUsize::new(0), seen: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<QueryBundle> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    fn name(&self) -> &str {
        "static"
    }

    async fn retrieve(&self, bundle: &QueryBundle) -> Result<Vec<ScoredNode>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(bundle.clone());
        Ok(self.nodes.clone())
    }
}

/// Retriever double that always fails.
pub struct FailingRetriever;

#[async_trait]
impl Retriever for FailingRetriever {
    fn name(&self) -> &str {
        "failing"
    }

    async fn retrieve(&self, _bundle: &QueryBundle) -> Result<Vec<ScoredNode>> {
        Err(QueryError::RetrievalError {
            retriever: "failing".into(),
            message: "index unreachable".into(),
        })
    }
}

/// Retriever double that cancels `token` while its call is outstanding and
/// then returns normally.
pub struct CancellingRetriever {
    pub token: CancellationToken,
    pub nodes: Vec<ScoredNode>,
}

#[async_trait]
impl Retriever for CancellingRetriever {
    fn name(&self) -> &str {
        "cancelling"
    }

    async fn retrieve(&self, _bundle: &QueryBundle) -> Result<Vec<ScoredNode>> {
        self.token.cancel();
        Ok(self.nodes.clone())
    }
}

/// Retriever double that never completes.
pub struct PendingRetriever;

#[async_trait]
impl Retriever for PendingRetriever {
    fn name(&self) -> &str {
        "pending"
    }

    async fn retrieve(&self, _bundle: &QueryBundle) -> Result<Vec<ScoredNode>> {
        std::future::pending().await
    }
}

/// Synthesizer double whose answer is the number of nodes it was given.
#[derive(Default)]
pub struct CountingSynthesizer {
    calls: AtomicUsize,
    seen: Mutex<Vec<QueryBundle>>,
}

impl CountingSynthesizer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<QueryBundle> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Synthesizer for CountingSynthesizer {
    fn name(&self) -> &str {
        "counting"
    }

    async fn synthesize(
        &self,
        bundle: &QueryBundle,
        nodes: Vec<ScoredNode>,
        additional_source_nodes: Vec<ScoredNode>,
    ) -> Result<Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(bundle.clone());
        let answer = nodes.len().to_string();
        let mut sources = nodes;
        sources.extend(additional_source_nodes);
        Ok(Response::new(answer, sources))
    }
}

/// Synthesizer double that always fails.
pub struct FailingSynthesizer;

#[async_trait]
impl Synthesizer for FailingSynthesizer {
    fn name(&self) -> &str {
        "failing"
    }

    async fn synthesize(
        &self,
        _bundle: &QueryBundle,
        _nodes: Vec<ScoredNode>,
        _additional_source_nodes: Vec<ScoredNode>,
    ) -> Result<Response> {
        Err(QueryError::CompletionError { service: "llm".into(), message: "quota exceeded".into() })
    }
}

/// Observer recording every transition and node count.
#[derive(Default)]
pub struct RecordingObserver {
    transitions: Mutex<Vec<(PipelineStage, PipelineStage)>>,
    node_counts: Mutex<Vec<(PipelineStage, usize)>>,
    failures: Mutex<Vec<PipelineStage>>,
}

impl RecordingObserver {
    /// The visited stages, starting from `Idle`.
    pub fn path(&self) -> Vec<PipelineStage> {
        let transitions = self.transitions.lock().unwrap();
        let mut path = vec![PipelineStage::Idle];
        path.extend(transitions.iter().map(|(_, to)| *to));
        path
    }

    pub fn node_counts(&self) -> Vec<(PipelineStage, usize)> {
        self.node_counts.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<PipelineStage> {
        self.failures.lock().unwrap().clone()
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_transition(&self, from: PipelineStage, to: PipelineStage) {
        self.transitions.lock().unwrap().push((from, to));
    }

    fn on_nodes(&self, stage: PipelineStage, count: usize) {
        self.node_counts.lock().unwrap().push((stage, count));
    }

    fn on_failure(&self, stage: PipelineStage, _error: &QueryError) {
        self.failures.lock().unwrap().push(stage);
    }
}
