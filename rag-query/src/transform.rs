//! Query transforms: rewrite a [`QueryBundle`] before retrieval.
//!
//! - [`IdentityTransform`] — returns its input unchanged
//! - [`TransformChain`] — applies several transforms in order
//! - [`HydeTransform`](crate::HydeTransform) — hypothetical document embeddings

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::query::{QueryBundle, TransformMetadata};

/// A stage that maps one [`QueryBundle`] to a new one.
///
/// Transforms never mutate the input bundle. A failing transform must
/// return [`QueryError::TransformError`](crate::QueryError::TransformError)
/// so the engine can abort before retrieval.
#[async_trait]
pub trait QueryTransform: Send + Sync {
    /// A short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Produce the rewritten bundle.
    async fn transform(
        &self,
        bundle: &QueryBundle,
        metadata: &TransformMetadata,
    ) -> Result<QueryBundle>;
}

/// A transform that returns a copy of its input.
///
/// This is the engine's default when no transform is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

#[async_trait]
impl QueryTransform for IdentityTransform {
    fn name(&self) -> &str {
        "identity"
    }

    async fn transform(
        &self,
        bundle: &QueryBundle,
        _metadata: &TransformMetadata,
    ) -> Result<QueryBundle> {
        Ok(bundle.clone())
    }
}

/// Applies transforms sequentially; each one sees the previous output.
///
/// The first failure stops the chain.
#[derive(Clone, Default)]
pub struct TransformChain {
    transforms: Vec<Arc<dyn QueryTransform>>,
}

impl TransformChain {
    /// Create an empty chain (behaves like [`IdentityTransform`]).
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transform to the end of the chain.
    pub fn then(mut self, transform: Arc<dyn QueryTransform>) -> Self {
        self.transforms.push(transform);
        self
    }

    /// Number of transforms in the chain.
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Whether the chain has no transforms.
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

#[async_trait]
impl QueryTransform for TransformChain {
    fn name(&self) -> &str {
        "chain"
    }

    async fn transform(
        &self,
        bundle: &QueryBundle,
        metadata: &TransformMetadata,
    ) -> Result<QueryBundle> {
        let mut current = bundle.clone();
        for transform in &self.transforms {
            debug!(transform = transform.name(), "applying chained transform");
            current = transform.transform(&current, metadata).await?;
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;

    struct Suffix(&'static str);

    #[async_trait]
    impl QueryTransform for Suffix {
        fn name(&self) -> &str {
            "suffix"
        }

        async fn transform(
            &self,
            bundle: &QueryBundle,
            _metadata: &TransformMetadata,
        ) -> Result<QueryBundle> {
            let mut strs = bundle.embedding_strs().to_vec();
            strs.push(self.0.to_string());
            Ok(QueryBundle::with_embedding_strs(bundle.query_str(), strs))
        }
    }

    struct Failing;

    #[async_trait]
    impl QueryTransform for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn transform(
            &self,
            _bundle: &QueryBundle,
            _metadata: &TransformMetadata,
        ) -> Result<QueryBundle> {
            Err(QueryError::TransformError { transform: "failing".into(), message: "boom".into() })
        }
    }

    #[tokio::test]
    async fn test_identity_returns_equal_bundle() {
        let bundle = QueryBundle::with_embedding_strs("q", ["e"]);
        let out = IdentityTransform.transform(&bundle, &TransformMetadata::new()).await.unwrap();
        assert_eq!(out, bundle);
    }

    #[tokio::test]
    async fn test_chain_applies_in_order() {
        let chain = TransformChain::new().then(Arc::new(Suffix("a"))).then(Arc::new(Suffix("b")));
        let out = chain.transform(&QueryBundle::new("q"), &TransformMetadata::new()).await.unwrap();
        assert_eq!(out.embedding_strs(), ["q", "a", "b"]);
        assert_eq!(out.query_str(), "q");
    }

    #[tokio::test]
    async fn test_chain_stops_on_first_failure() {
        let chain = TransformChain::new().then(Arc::new(Failing)).then(Arc::new(Suffix("never")));
        let err =
            chain.transform(&QueryBundle::new("q"), &TransformMetadata::new()).await.unwrap_err();
        assert!(matches!(err, QueryError::TransformError { .. }));
    }

    #[tokio::test]
    async fn test_empty_chain_is_identity() {
        let bundle = QueryBundle::new("q");
        let chain = TransformChain::new();
        assert!(chain.is_empty());
        let out = chain.transform(&bundle, &TransformMetadata::new()).await.unwrap();
        assert_eq!(out, bundle);
    }
}
