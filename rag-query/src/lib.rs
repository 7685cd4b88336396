//! # rag-query
//!
//! A retrieval-augmented query engine with pluggable query transforms.
//!
//! A query flows through four stages:
//!
//! 1. **Transform** — a [`QueryTransform`] rewrites the [`QueryBundle`]
//!    (for example [`HydeTransform`] adds a hypothetical answer passage to
//!    the embedding strings)
//! 2. **Retrieve** — a [`Retriever`] returns scored evidence nodes
//! 3. **Postprocess** — a [`NodePostprocessorChain`] filters and reorders them
//! 4. **Synthesize** — a [`Synthesizer`] produces the final [`Response`]
//!
//! [`TransformQueryEngine`] composes the stages. Each operation is available
//! as an async method and as a blocking method running the same code.
//!
//! ## Features
//!
//! - `openai` — [`openai::OpenAICompletionService`] over the chat completions API
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rag_query::{CompletionSynthesizer, TransformQueryEngine, VectorRetriever};
//!
//! let engine = TransformQueryEngine::builder()
//!     .hyde(completion.clone())
//!     .retriever(Arc::new(VectorRetriever::new(embedder, store, 5)))
//!     .synthesizer(Arc::new(CompletionSynthesizer::new(completion)))
//!     .build()?;
//!
//! let response = engine.query("What is SPF?").await?;
//! println!("{}\n\n{}", response.response, response.format_sources());
//! ```

pub mod blocking;
pub mod cancel;
pub mod completion;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod hyde;
pub mod inmemory;
pub mod node;
pub mod observer;
pub mod postprocessor;
pub mod prompt;
pub mod query;
pub mod retriever;
pub mod synthesizer;
pub mod transform;
pub mod vectorstore;

#[cfg(feature = "openai")]
pub mod openai;

pub use cancel::CancellationToken;
pub use completion::CompletionService;
pub use config::{QueryEngineConfig, QueryEngineConfigBuilder};
pub use embedding::EmbeddingProvider;
pub use engine::{PipelineStage, TransformQueryEngine, TransformQueryEngineBuilder};
pub use error::{QueryError, Result};
pub use hyde::HydeTransform;
pub use inmemory::InMemoryVectorStore;
pub use node::{Response, ScoredNode};
pub use observer::{NoopObserver, PipelineObserver, TracingObserver};
pub use postprocessor::{
    KeywordBoost, NodePostprocessor, NodePostprocessorChain, SimilarityCutoff, TopN,
};
pub use prompt::PromptTemplate;
pub use query::{MetadataValue, QueryBundle, TransformMetadata};
pub use retriever::{Retriever, VectorRetriever};
pub use synthesizer::{CompletionSynthesizer, Synthesizer};
pub use transform::{IdentityTransform, QueryTransform, TransformChain};
pub use vectorstore::VectorStore;
