//! Observability sink injected into the engine.
//!
//! The engine never touches global logging state. Stage transitions, node
//! counts and failures are reported to a [`PipelineObserver`] supplied at
//! construction; [`TracingObserver`] forwards them as `tracing` events and
//! leaves subscriber setup to the application.

use tracing::{debug, error, info};

use crate::engine::PipelineStage;
use crate::error::QueryError;

/// Receives pipeline lifecycle events.
///
/// Calls happen synchronously on the invocation's task, so implementations
/// should be cheap. All methods default to no-ops.
pub trait PipelineObserver: Send + Sync {
    /// The invocation moved from `from` to `to`.
    fn on_transition(&self, from: PipelineStage, to: PipelineStage) {
        let _ = (from, to);
    }

    /// `count` nodes left `stage` (retrieval or postprocessing).
    fn on_nodes(&self, stage: PipelineStage, count: usize) {
        let _ = (stage, count);
    }

    /// The invocation failed while in `stage`.
    fn on_failure(&self, stage: PipelineStage, error: &QueryError) {
        let _ = (stage, error);
    }
}

/// Emits lifecycle events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_transition(&self, from: PipelineStage, to: PipelineStage) {
        debug!(%from, %to, "pipeline stage transition");
    }

    fn on_nodes(&self, stage: PipelineStage, count: usize) {
        info!(%stage, node_count = count, "nodes passed stage");
    }

    fn on_failure(&self, stage: PipelineStage, error: &QueryError) {
        error!(%stage, error = %error, "pipeline failed");
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}
