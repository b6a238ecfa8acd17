//! The question-answer turn.
//!
//! # Flow
//!
//! 1. Validate the request (no collaborator is called for a blank question)
//! 2. Render the last K history turns as a transcript
//! 3. Search the knowledge store with the raw question
//! 4. Concatenate the retrieved chunks into the context
//! 5. Assemble the prompt and ask the completion provider
//! 6. Record the turn in the session history
//!
//! Collaborator failures are returned as typed [`AskError`]s and are never
//! retried; the history is only written after a successful completion.

use std::sync::Arc;

use gamewizard_config::{AppConfig, ConfigError, MAX_RETRIEVAL_DEPTH};
use gamewizard_core::error::{ProviderError, RetrievalError};
use gamewizard_core::history::ConversationHistory;
use gamewizard_core::knowledge::KnowledgeStore;
use gamewizard_core::provider::{CompletionProvider, CompletionRequest};
use gamewizard_providers::Backends;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::prompt::{assemble_context, build_prompt, format_transcript, ContextPolicy};

/// One question from the user.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub question: String,
    /// Completion model identifier
    pub model: String,
    /// Chunks to retrieve (1–20)
    pub depth: usize,
    /// History turns to replay; the retrieval depth when `None`
    pub history_depth: Option<usize>,
}

impl TurnRequest {
    pub fn new(question: impl Into<String>, model: impl Into<String>, depth: usize) -> Self {
        Self {
            question: question.into(),
            model: model.into(),
            depth,
            history_depth: None,
        }
    }

    pub fn with_history_depth(mut self, history_depth: usize) -> Self {
        self.history_depth = Some(history_depth);
        self
    }
}

/// A successful turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    /// The model's answer
    pub answer: String,
    /// The retrieved text that went into the prompt
    pub context: String,
    /// Source of the top-ranked chunk
    pub top_source: Option<String>,
    /// How many chunks the store returned
    pub chunks_retrieved: usize,
    pub model: String,
}

/// Why a turn produced no answer.
#[derive(Debug, thiserror::Error)]
pub enum AskError {
    #[error("Please enter your question first.")]
    EmptyQuestion,

    #[error("Knowledge depth must be between 1 and {max}, got {depth}")]
    InvalidDepth { depth: usize, max: usize },

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Knowledge search failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Completion failed: {0}")]
    Completion(#[from] ProviderError),
}

impl AskError {
    /// True when the request itself was at fault, not a collaborator.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            AskError::EmptyQuestion | AskError::InvalidDepth { .. } | AskError::UnknownModel(_)
        )
    }
}

/// Answers questions from a knowledge store and a completion provider.
///
/// The agent holds no session state: the caller owns the history and passes
/// it in for each turn.
pub struct WizardAgent {
    knowledge: Arc<dyn KnowledgeStore>,
    completion: Arc<dyn CompletionProvider>,
    system_prompt: String,
    /// Allowed model identifiers; empty allows any
    models: Vec<String>,
    context_policy: ContextPolicy,
}

impl WizardAgent {
    pub fn new(
        knowledge: Arc<dyn KnowledgeStore>,
        completion: Arc<dyn CompletionProvider>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            knowledge,
            completion,
            system_prompt: system_prompt.into(),
            models: Vec::new(),
            context_policy: ContextPolicy::default(),
        }
    }

    /// Build an agent from configuration and ready backends.
    pub fn from_config(config: &AppConfig, backends: Backends) -> Result<Self, ConfigError> {
        let system_prompt = config.system_prompt()?;
        Ok(Self::new(backends.knowledge, backends.completion, system_prompt)
            .with_models(config.completion.models.clone())
            .with_context_policy(ContextPolicy::from_drop_flag(
                config.retrieval.drop_lowest_ranked,
            )))
    }

    /// Restrict the models a request may name.
    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    pub fn with_context_policy(mut self, policy: ContextPolicy) -> Self {
        self.context_policy = policy;
        self
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn knowledge(&self) -> &Arc<dyn KnowledgeStore> {
        &self.knowledge
    }

    pub fn completion(&self) -> &Arc<dyn CompletionProvider> {
        &self.completion
    }

    /// Check a request without touching the backends or any history.
    pub fn validate(&self, request: &TurnRequest) -> Result<(), AskError> {
        if request.question.trim().is_empty() {
            return Err(AskError::EmptyQuestion);
        }
        if request.depth == 0 || request.depth > MAX_RETRIEVAL_DEPTH {
            return Err(AskError::InvalidDepth {
                depth: request.depth,
                max: MAX_RETRIEVAL_DEPTH,
            });
        }
        if !self.models.is_empty() && !self.models.contains(&request.model) {
            return Err(AskError::UnknownModel(request.model.clone()));
        }
        Ok(())
    }

    /// Answer one question and record the turn in `history`.
    pub async fn ask(
        &self,
        request: &TurnRequest,
        history: &mut ConversationHistory,
    ) -> Result<TurnOutcome, AskError> {
        self.validate(request)?;

        let history_depth = request.history_depth.unwrap_or(request.depth);
        let transcript = format_transcript(&history.peek(history_depth));

        info!(
            model = %request.model,
            depth = request.depth,
            history_turns = history.len().min(history_depth),
            "Wizard: retrieving knowledge"
        );

        let chunks = self
            .knowledge
            .search(&request.question, request.depth)
            .await
            .inspect_err(|e| warn!(store = self.knowledge.name(), error = %e, "Knowledge search failed"))?;

        let context = assemble_context(&chunks, self.context_policy);
        let top_source = chunks.first().map(|c| c.source.clone());

        debug!(
            chunks = chunks.len(),
            context_len = context.len(),
            top_source = ?top_source,
            "Wizard: context assembled"
        );

        let prompt = build_prompt(&self.system_prompt, &transcript, &context, &request.question);
        let response = self
            .completion
            .complete(CompletionRequest::new(&request.model, prompt))
            .await
            .inspect_err(|e| {
                warn!(provider = self.completion.name(), error = %e, "Completion failed")
            })?;

        history.push(request.question.clone(), response.text.clone());

        info!(answer_len = response.text.len(), "Wizard: answer generated");

        Ok(TurnOutcome {
            answer: response.text,
            context,
            top_source,
            chunks_retrieved: chunks.len(),
            model: request.model.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{EchoProvider, ScriptedStore};

    fn agent(store: Arc<ScriptedStore>, provider: Arc<EchoProvider>) -> WizardAgent {
        WizardAgent::new(store, provider, "You are Game Wizard.")
            .with_models(vec!["mistral-7b".into()])
    }

    #[tokio::test]
    async fn answers_and_records_turn() {
        let store = Arc::new(ScriptedStore::with_texts(&["alpha", "beta", "gamma"]));
        let provider = Arc::new(EchoProvider::new());
        let wizard = agent(store.clone(), provider.clone());
        let mut history = ConversationHistory::new(14);

        let outcome = wizard
            .ask(&TurnRequest::new("Who is Link?", "mistral-7b", 3), &mut history)
            .await
            .unwrap();

        assert_eq!(store.calls(), vec![("Who is Link?".to_string(), 3)]);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(outcome.top_source.as_deref(), Some("doc0.pdf"));
        assert_eq!(outcome.chunks_retrieved, 3);
        assert_eq!(history.len(), 1);
        let turn = &history.peek(1)[0];
        assert_eq!(turn.user_input(), "Who is Link?");
        assert_eq!(turn.ai_message(), outcome.answer);
    }

    // Reproduces the deployed behavior of leaving out the lowest-ranked chunk.
    #[tokio::test]
    async fn context_leaves_out_lowest_ranked_chunk() {
        let store = Arc::new(ScriptedStore::with_texts(&["alpha", "beta", "gamma"]));
        let provider = Arc::new(EchoProvider::new());
        let wizard = agent(store, provider.clone());
        let mut history = ConversationHistory::new(14);

        let outcome = wizard
            .ask(&TurnRequest::new("q", "mistral-7b", 3), &mut history)
            .await
            .unwrap();

        assert_eq!(outcome.context, "alphabeta");
        let prompt = provider.last_prompt().unwrap();
        assert!(prompt.contains("Context:\nalphabeta\n"));
        assert!(!prompt.contains("gamma"));
    }

    #[tokio::test]
    async fn include_all_policy_uses_every_chunk() {
        let store = Arc::new(ScriptedStore::with_texts(&["alpha", "beta", "gamma"]));
        let wizard = agent(store, Arc::new(EchoProvider::new()))
            .with_context_policy(ContextPolicy::IncludeAll);
        let mut history = ConversationHistory::new(14);

        let outcome = wizard
            .ask(&TurnRequest::new("q", "mistral-7b", 3), &mut history)
            .await
            .unwrap();
        assert_eq!(outcome.context, "alphabetagamma");
    }

    #[tokio::test]
    async fn context_has_no_single_quotes() {
        let store = Arc::new(ScriptedStore::with_texts(&["Link's sword", "Zelda's 'harp'", "x"]));
        let wizard = agent(store, Arc::new(EchoProvider::new()));
        let mut history = ConversationHistory::new(14);

        let outcome = wizard
            .ask(&TurnRequest::new("q", "mistral-7b", 3), &mut history)
            .await
            .unwrap();
        assert!(!outcome.context.contains('\''));
        assert_eq!(outcome.context, "Links swordZeldas harp");
    }

    #[tokio::test]
    async fn empty_question_makes_no_calls() {
        let store = Arc::new(ScriptedStore::with_texts(&["alpha"]));
        let provider = Arc::new(EchoProvider::new());
        let wizard = agent(store.clone(), provider.clone());
        let mut history = ConversationHistory::new(14);

        for question in ["", "   ", "\n\t"] {
            let err = wizard
                .ask(&TurnRequest::new(question, "mistral-7b", 5), &mut history)
                .await
                .unwrap_err();
            assert!(matches!(err, AskError::EmptyQuestion));
            assert!(err.is_user_error());
        }

        assert_eq!(store.call_count(), 0);
        assert_eq!(provider.call_count(), 0);
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn invalid_depth_and_model_rejected_before_calls() {
        let store = Arc::new(ScriptedStore::with_texts(&["alpha"]));
        let provider = Arc::new(EchoProvider::new());
        let wizard = agent(store.clone(), provider.clone());
        let mut history = ConversationHistory::new(14);

        let err = wizard
            .ask(&TurnRequest::new("q", "mistral-7b", 0), &mut history)
            .await
            .unwrap_err();
        assert!(matches!(err, AskError::InvalidDepth { depth: 0, max: 20 }));

        let err = wizard
            .ask(&TurnRequest::new("q", "mistral-7b", 21), &mut history)
            .await
            .unwrap_err();
        assert!(matches!(err, AskError::InvalidDepth { depth: 21, .. }));

        let err = wizard
            .ask(&TurnRequest::new("q", "gpt-9", 5), &mut history)
            .await
            .unwrap_err();
        assert!(matches!(err, AskError::UnknownModel(ref m) if m == "gpt-9"));

        assert_eq!(store.call_count(), 0);
        assert_eq!(provider.call_count(), 0);
    }

    #[test]
    fn validate_checks_without_backends() {
        let store = Arc::new(ScriptedStore::with_texts(&["alpha"]));
        let provider = Arc::new(EchoProvider::new());
        let wizard = agent(store.clone(), provider.clone());

        assert!(wizard.validate(&TurnRequest::new("q", "mistral-7b", 20)).is_ok());
        assert!(matches!(
            wizard.validate(&TurnRequest::new("", "mistral-7b", 5)),
            Err(AskError::EmptyQuestion)
        ));
        assert!(matches!(
            wizard.validate(&TurnRequest::new("q", "mistral-7b", 21)),
            Err(AskError::InvalidDepth { depth: 21, .. })
        ));
        assert!(matches!(
            wizard.validate(&TurnRequest::new("q", "gpt-9", 5)),
            Err(AskError::UnknownModel(_))
        ));
        assert_eq!(store.call_count(), 0);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn retrieval_failure_propagates_without_completion() {
        let provider = Arc::new(EchoProvider::new());
        let wizard = agent(Arc::new(ScriptedStore::failing()), provider.clone());
        let mut history = ConversationHistory::new(14);

        let err = wizard
            .ask(&TurnRequest::new("q", "mistral-7b", 5), &mut history)
            .await
            .unwrap_err();

        assert!(matches!(err, AskError::Retrieval(_)));
        assert!(!err.is_user_error());
        assert!(err.to_string().contains("warehouse suspended"));
        assert_eq!(provider.call_count(), 0);
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn completion_failure_leaves_history_untouched() {
        let store = Arc::new(ScriptedStore::with_texts(&["alpha", "beta"]));
        let provider = Arc::new(EchoProvider::failing());
        let wizard = agent(store.clone(), provider.clone());
        let mut history = ConversationHistory::new(14);
        history.push("earlier", "answer");

        let err = wizard
            .ask(&TurnRequest::new("q", "mistral-7b", 2), &mut history)
            .await
            .unwrap_err();

        assert!(matches!(err, AskError::Completion(_)));
        assert_eq!(store.call_count(), 1);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn transcript_replays_recent_history() {
        let store = Arc::new(ScriptedStore::with_texts(&["alpha", "beta"]));
        let provider = Arc::new(EchoProvider::new());
        let wizard = agent(store, provider.clone());
        let mut history = ConversationHistory::new(14);
        history.push("q1", "a1");
        history.push("q2", "a2");
        history.push("q3", "a3");

        wizard
            .ask(
                &TurnRequest::new("q4", "mistral-7b", 2).with_history_depth(2),
                &mut history,
            )
            .await
            .unwrap();

        let prompt = provider.last_prompt().unwrap();
        assert!(prompt.contains("Chat History:\nUser: q2\nAI: a2\nUser: q3\nAI: a3\n"));
        assert!(!prompt.contains("User: q1"));
        assert_eq!(history.len(), 4);
    }

    #[tokio::test]
    async fn history_depth_defaults_to_retrieval_depth() {
        let store = Arc::new(ScriptedStore::with_texts(&["alpha"]));
        let provider = Arc::new(EchoProvider::new());
        let wizard = agent(store, provider.clone());
        let mut history = ConversationHistory::new(14);
        history.push("q1", "a1");
        history.push("q2", "a2");

        wizard
            .ask(&TurnRequest::new("q3", "mistral-7b", 1), &mut history)
            .await
            .unwrap();

        let prompt = provider.last_prompt().unwrap();
        assert!(prompt.contains("User: q2"));
        assert!(!prompt.contains("User: q1"));
    }

    #[tokio::test]
    async fn nothing_retrieved_still_answers() {
        let store = Arc::new(ScriptedStore::with_texts(&[]));
        let wizard = agent(store, Arc::new(EchoProvider::new()));
        let mut history = ConversationHistory::new(14);

        let outcome = wizard
            .ask(&TurnRequest::new("q", "mistral-7b", 5), &mut history)
            .await
            .unwrap();
        assert_eq!(outcome.context, "");
        assert_eq!(outcome.top_source, None);
        assert_eq!(outcome.chunks_retrieved, 0);
    }

    #[tokio::test]
    async fn empty_model_list_allows_any_model() {
        let store = Arc::new(ScriptedStore::with_texts(&["alpha"]));
        let wizard = WizardAgent::new(store, Arc::new(EchoProvider::new()), "sys");
        let mut history = ConversationHistory::new(2);

        let outcome = wizard
            .ask(&TurnRequest::new("q", "anything", 1), &mut history)
            .await
            .unwrap();
        assert_eq!(outcome.model, "anything");
    }

    #[test]
    fn from_config_uses_prompt_and_policy() {
        let mut config = AppConfig::default();
        config.prompt.system_prompt_override = Some("Only talk about games.".into());
        config.retrieval.drop_lowest_ranked = false;

        let backends = Backends {
            knowledge: Arc::new(ScriptedStore::with_texts(&[])),
            completion: Arc::new(EchoProvider::new()),
        };
        let wizard = WizardAgent::from_config(&config, backends).unwrap();

        assert_eq!(wizard.system_prompt, "Only talk about games.");
        assert_eq!(wizard.context_policy, ContextPolicy::IncludeAll);
        assert_eq!(wizard.models(), ["mistral-7b".to_string()]);
    }
}
