//! In-memory knowledge store for demos, offline runs and tests.
//!
//! Chunks are loaded from a JSON array of `{"content": ..., "source": ...}`
//! objects. Ranking is keyword overlap: the share of distinct query terms
//! that appear in a chunk. Chunks with no overlap are never returned.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use gamewizard_core::error::RetrievalError;
use gamewizard_core::knowledge::{KnowledgeChunk, KnowledgeStore};

/// A knowledge store held entirely in a Vec.
pub struct InMemoryKnowledgeStore {
    chunks: Vec<KnowledgeChunk>,
}

impl InMemoryKnowledgeStore {
    pub fn new(chunks: Vec<KnowledgeChunk>) -> Self {
        Self { chunks }
    }

    /// Load chunks from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, RetrievalError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RetrievalError::Unavailable(format!("cannot read {}: {e}", path.display()))
        })?;
        let chunks: Vec<KnowledgeChunk> = serde_json::from_str(&content).map_err(|e| {
            RetrievalError::MalformedResult(format!("invalid knowledge file {}: {e}", path.display()))
        })?;

        tracing::info!(chunks = chunks.len(), path = %path.display(), "Loaded knowledge file");
        Ok(Self::new(chunks))
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Lowercased alphanumeric words of two or more characters.
fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 2)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<KnowledgeChunk>, RetrievalError> {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<KnowledgeChunk> = self
            .chunks
            .iter()
            .filter_map(|chunk| {
                let chunk_terms = terms(&chunk.content);
                let hits = query_terms.intersection(&chunk_terms).count();
                (hits > 0).then(|| KnowledgeChunk {
                    similarity: hits as f32 / query_terms.len() as f32,
                    ..chunk.clone()
                })
            })
            .collect();

        // Stable sort keeps file order among equal scores.
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);

        Ok(scored)
    }
}
