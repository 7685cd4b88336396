//! Query bundles and transform metadata.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single retrieval request.
///
/// `query_str` is the question as the user asked it; it is what synthesis
/// and lexical matching see. `embedding_strs` are the strings a retriever
/// embeds to drive similarity search. Unless overridden, they default to a
/// single entry equal to `query_str`.
///
/// Bundles are immutable: transforms build a new bundle instead of editing
/// the one they were given.
///
/// # Example
///
/// ```rust
/// use rag_query::QueryBundle;
///
/// let bundle = QueryBundle::new("What is SPF?");
/// assert_eq!(bundle.query_str(), "What is SPF?");
/// assert_eq!(bundle.embedding_strs(), ["What is SPF?"]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryBundle {
    query_str: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_embedding_strs: Option<Vec<String>>,
}

impl QueryBundle {
    /// Create a bundle whose embedding strings default to `[query_str]`.
    pub fn new(query_str: impl Into<String>) -> Self {
        Self { query_str: query_str.into(), custom_embedding_strs: None }
    }

    /// Create a bundle with an explicit set of embedding strings.
    pub fn with_embedding_strs<I, S>(query_str: impl Into<String>, embedding_strs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            query_str: query_str.into(),
            custom_embedding_strs: Some(embedding_strs.into_iter().map(Into::into).collect()),
        }
    }

    /// The canonical query text.
    pub fn query_str(&self) -> &str {
        &self.query_str
    }

    /// The strings used to compute retrieval embeddings, in order.
    pub fn embedding_strs(&self) -> &[String] {
        match &self.custom_embedding_strs {
            Some(strs) => strs,
            None => std::slice::from_ref(&self.query_str),
        }
    }

    /// Whether the embedding strings were set explicitly.
    pub fn has_custom_embedding_strs(&self) -> bool {
        self.custom_embedding_strs.is_some()
    }
}

impl From<&str> for QueryBundle {
    fn from(query_str: &str) -> Self {
        Self::new(query_str)
    }
}

impl From<String> for QueryBundle {
    fn from(query_str: String) -> Self {
        Self::new(query_str)
    }
}

impl From<&QueryBundle> for QueryBundle {
    fn from(bundle: &QueryBundle) -> Self {
        bundle.clone()
    }
}

impl fmt::Display for QueryBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query_str)
    }
}

/// A value carried in [`TransformMetadata`].
///
/// Restricted to strings, numbers, and booleans so transforms can only
/// depend on plain, comparable data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MetadataValue {
    /// A boolean flag.
    Bool(bool),
    /// A numeric value.
    Number(f64),
    /// A string value.
    String(String),
}

impl MetadataValue {
    /// Returns the string value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the numeric value, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the boolean value, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Out-of-band context handed to a [`QueryTransform`](crate::QueryTransform)
/// alongside the bundle (prior turn, target language, ...).
///
/// Read-only to transforms.
pub type TransformMetadata = BTreeMap<String, MetadataValue>;
