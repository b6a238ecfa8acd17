//! Shared test doubles for the question-answer turn.

use std::sync::Mutex;

use gamewizard_core::error::{ProviderError, RetrievalError};
use gamewizard_core::knowledge::{KnowledgeChunk, KnowledgeStore};
use gamewizard_core::provider::{CompletionProvider, CompletionRequest, CompletionResponse};

/// A knowledge store that returns a fixed ranking and counts calls.
pub struct ScriptedStore {
    chunks: Vec<KnowledgeChunk>,
    fail: bool,
    calls: Mutex<Vec<(String, usize)>>,
}

impl ScriptedStore {
    /// Chunks ranked in the given order, sourced `doc0.pdf`, `doc1.pdf`, ...
    pub fn with_texts(texts: &[&str]) -> Self {
        let chunks = texts
            .iter()
            .enumerate()
            .map(|(i, t)| KnowledgeChunk::new(*t, format!("doc{i}.pdf"), 0.9 - i as f32 * 0.1))
            .collect();
        Self {
            chunks,
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::with_texts(&[])
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The `(query, top_k)` of every call so far.
    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl KnowledgeStore for ScriptedStore {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<KnowledgeChunk>, RetrievalError> {
        self.calls.lock().unwrap().push((query.to_string(), top_k));
        if self.fail {
            return Err(RetrievalError::Unavailable("warehouse suspended".into()));
        }
        Ok(self.chunks.iter().take(top_k).cloned().collect())
    }
}

/// A completion provider that answers with its prompt, or fails.
pub struct EchoProvider {
    fail: bool,
    prompts: Mutex<Vec<String>>,
}

impl EchoProvider {
    pub fn new() -> Self {
        Self {
            fail: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait::async_trait]
impl CompletionProvider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        if self.fail {
            return Err(ProviderError::ApiError {
                status_code: 500,
                message: "model overloaded".into(),
            });
        }
        Ok(CompletionResponse {
            text: request.prompt,
            model: request.model,
        })
    }
}
