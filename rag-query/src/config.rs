//! Configuration for the query engine.

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};

/// Configuration parameters for [`TransformQueryEngine`](crate::TransformQueryEngine)
/// and the HyDE transform built from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueryEngineConfig {
    /// Keep the original embedding strings after the hypothetical document.
    pub include_original: bool,
    /// Drop postprocessed nodes scoring below this value.
    pub similarity_cutoff: Option<f32>,
    /// Keep at most this many postprocessed nodes.
    pub top_n: Option<usize>,
}

impl Default for QueryEngineConfig {
    fn default() -> Self {
        Self { include_original: true, similarity_cutoff: None, top_n: None }
    }
}

impl QueryEngineConfig {
    /// Create a new builder for constructing a [`QueryEngineConfig`].
    pub fn builder() -> QueryEngineConfigBuilder {
        QueryEngineConfigBuilder::default()
    }

    /// Check the configuration for values the engine cannot honour.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::ConfigError`] if:
    /// - `similarity_cutoff` is NaN or infinite
    /// - `top_n == Some(0)`
    pub fn validate(&self) -> Result<()> {
        if let Some(cutoff) = self.similarity_cutoff {
            if !cutoff.is_finite() {
                return Err(QueryError::ConfigError(format!(
                    "similarity_cutoff must be finite, got {cutoff}"
                )));
            }
        }
        if self.top_n == Some(0) {
            return Err(QueryError::ConfigError("top_n must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`QueryEngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct QueryEngineConfigBuilder {
    config: QueryEngineConfig,
}

impl QueryEngineConfigBuilder {
    /// Set whether HyDE keeps the original embedding strings.
    pub fn include_original(mut self, include: bool) -> Self {
        self.config.include_original = include;
        self
    }

    /// Set the minimum score kept after postprocessing.
    pub fn similarity_cutoff(mut self, cutoff: f32) -> Self {
        self.config.similarity_cutoff = Some(cutoff);
        self
    }

    /// Set the maximum number of nodes kept after postprocessing.
    pub fn top_n(mut self, n: usize) -> Self {
        self.config.top_n = Some(n);
        self
    }

    /// Build the [`QueryEngineConfig`], validating it.
    ///
    /// # Errors
    ///
    /// See [`QueryEngineConfig::validate`].
    pub fn build(self) -> Result<QueryEngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
