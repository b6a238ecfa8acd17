//! Completion provider trait, the abstraction over hosted LLM backends.
//!
//! A provider takes one fully assembled prompt and a model identifier and
//! returns a single generated text. There is no streaming and no tool use:
//! the question-answer turn needs exactly one response per call.
//!
//! Implementations: Snowflake Cortex `COMPLETE`, OpenAI-compatible endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// A single completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model to use (e.g., "mistral-7b")
    pub model: String,

    /// The assembled prompt text
    pub prompt: String,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
        }
    }
}

/// The provider's answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Generated text
    pub text: String,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// The completion collaborator.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "cortex", "openai").
    fn name(&self) -> &str;

    /// Send a prompt and get the complete response.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, ProviderError>;

    /// Can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}
