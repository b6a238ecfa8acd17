//! Knowledge store trait: similarity search over stored passages.
//!
//! The store embeds the query, ranks its chunks by similarity and returns
//! the best matches. Ranking and scoring belong to the store; callers only
//! rely on the result being ordered best-first.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// A retrieved passage plus where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    /// The passage text
    pub content: String,

    /// Originating document (relative path in the stage)
    pub source: String,

    /// Similarity to the query, higher is closer
    #[serde(default)]
    pub similarity: f32,
}

impl KnowledgeChunk {
    pub fn new(content: impl Into<String>, source: impl Into<String>, similarity: f32) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
            similarity,
        }
    }
}

/// The retrieval collaborator.
///
/// Implementations: Snowflake Cortex vector search, in-memory (file-backed).
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// A human-readable name for this store (e.g., "cortex", "in_memory").
    fn name(&self) -> &str;

    /// Return up to `top_k` chunks ordered by descending similarity.
    async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> std::result::Result<Vec<KnowledgeChunk>, RetrievalError>;

    /// Can we reach the store?
    async fn health_check(&self) -> std::result::Result<bool, RetrievalError> {
        Ok(true)
    }
}
