//! Tests for `VectorRetriever` over the in-memory store, including the
//! retrieval effect of a HyDE rewrite.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{CountingSynthesizer, FixedCompletion};
use proptest::prelude::*;
use rag_query::{
    EmbeddingProvider, InMemoryVectorStore, QueryBundle, QueryError, Result, Retriever,
    TransformQueryEngine, VectorRetriever, VectorStore,
};

const VOCAB: [&str; 10] =
    ["spf", "dns", "txt", "record", "senders", "mail", "dkim", "signature", "cake", "flour"];

/// Bag-of-words embedder over a fixed vocabulary.
struct VocabEmbedder;

#[async_trait]
impl EmbeddingProvider for VocabEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embedding = vec![0.0; VOCAB.len()];
        for token in text.split(|c: char| !c.is_alphanumeric()).map(str::to_lowercase) {
            if let Some(i) = VOCAB.iter().position(|v| *v == token) {
                embedding[i] += 1.0;
            }
        }
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        VOCAB.len()
    }
}

struct BrokenEmbedder;

#[async_trait]
impl EmbeddingProvider for BrokenEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(QueryError::ConfigError("model not loaded".into()))
    }

    fn dimensions(&self) -> usize {
        VOCAB.len()
    }
}

async fn mail_store() -> Arc<InMemoryVectorStore> {
    let store = Arc::new(InMemoryVectorStore::new());
    let docs = [
        ("spf", "SPF is a DNS TXT record listing senders allowed to send mail"),
        ("dkim", "DKIM adds a signature to mail"),
        ("cake", "Cake needs flour"),
    ];
    for (id, text) in docs {
        let embedding = VocabEmbedder.embed(text).await.unwrap();
        let metadata = HashMap::from([("source".to_string(), format!("{id}.md"))]);
        store.insert(id, text, metadata, embedding).await;
    }
    store
}

const QUESTION: &str = "Which hosts may send mail for my domain?";

#[tokio::test]
async fn test_plain_question_prefers_lexically_closer_doc() {
    let retriever = VectorRetriever::new(Arc::new(VocabEmbedder), mail_store().await, 3);
    let nodes = retriever.retrieve(&QueryBundle::new(QUESTION)).await.unwrap();
    assert_eq!(nodes[0].id, "dkim");
}

#[tokio::test]
async fn test_hyde_rewrite_surfaces_answer_bearing_doc() {
    let completion = Arc::new(FixedCompletion::replying(
        "An SPF DNS TXT record lists the senders allowed for the domain",
    ));
    let engine = TransformQueryEngine::builder()
        .hyde(completion)
        .retriever(Arc::new(VectorRetriever::new(Arc::new(VocabEmbedder), mail_store().await, 3)))
        .synthesizer(Arc::new(CountingSynthesizer::default()))
        .build()
        .unwrap();

    let nodes = engine.retrieve(QUESTION).await.unwrap();

    assert_eq!(nodes[0].id, "spf");
    assert_eq!(nodes[0].metadata["source"], "spf.md");
    assert!(nodes[0].score > 0.99);
}

#[tokio::test]
async fn test_embedding_failure_is_retrieval_error() {
    let retriever = VectorRetriever::new(Arc::new(BrokenEmbedder), mail_store().await, 3);
    let err = retriever.retrieve(&QueryBundle::new(QUESTION)).await.unwrap_err();
    match err {
        QueryError::RetrievalError { message, .. } => assert!(message.contains("model not loaded")),
        other => panic!("expected retrieval error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_bundle_without_embedding_strs_is_rejected() {
    let retriever = VectorRetriever::new(Arc::new(VocabEmbedder), mail_store().await, 3);
    let bundle = QueryBundle::with_embedding_strs(QUESTION, Vec::<String>::new());
    assert!(matches!(
        retriever.retrieve(&bundle).await,
        Err(QueryError::RetrievalError { .. })
    ));
}

#[tokio::test]
async fn test_no_matches_is_empty_not_error() {
    let retriever =
        VectorRetriever::new(Arc::new(VocabEmbedder), Arc::new(InMemoryVectorStore::new()), 3);
    assert!(retriever.retrieve(&QueryBundle::new(QUESTION)).await.unwrap().is_empty());
}

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// **Property: in-memory search ordering**
/// *For any* set of embedded nodes, searching SHALL return results ordered by
/// descending cosine similarity, and at most `top_k` of them.
mod prop_inmemory_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_top_k(
            embeddings in proptest::collection::vec(arb_normalized_embedding(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let count = embeddings.len();
            let results = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                for (i, embedding) in embeddings.into_iter().enumerate() {
                    store.insert(format!("n{i}"), "text", HashMap::new(), embedding).await;
                }
                store.search(&query, top_k).await.unwrap()
            });

            prop_assert!(results.len() <= top_k);
            prop_assert_eq!(results.len(), top_k.min(count));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }
        }
    }
}
