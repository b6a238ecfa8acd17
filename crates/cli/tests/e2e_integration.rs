//! End-to-end integration tests for Game Wizard.
//!
//! These tests exercise the full pipeline from a config file on disk to an
//! answer: backend selection, file-backed retrieval, prompt assembly, the
//! bounded history and the HTTP surface.

use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use gamewizard_agent::{AskError, TurnRequest, WizardAgent};
use gamewizard_config::AppConfig;
use gamewizard_core::error::{ProviderError, RetrievalError};
use gamewizard_core::history::ConversationHistory;
use gamewizard_core::knowledge::{KnowledgeChunk, KnowledgeStore};
use gamewizard_core::provider::{CompletionProvider, CompletionRequest, CompletionResponse};
use gamewizard_gateway::{ApiState, build_router};
use gamewizard_providers::{Backends, build_from_config};

// ── Mock collaborators ───────────────────────────────────────────────────

/// A completion provider that answers from a script and records prompts.
struct ScriptedProvider {
    answers: Vec<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let mut prompts = self.prompts.lock().unwrap();
        let answer = self
            .answers
            .get(prompts.len())
            .or(self.answers.last())
            .cloned()
            .unwrap_or_default();
        prompts.push(request.prompt);
        Ok(CompletionResponse {
            text: answer,
            model: request.model,
        })
    }
}

struct DownStore;

#[async_trait::async_trait]
impl KnowledgeStore for DownStore {
    fn name(&self) -> &str {
        "down"
    }

    async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<KnowledgeChunk>, RetrievalError> {
        Err(RetrievalError::AuthenticationFailed("token expired".into()))
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

const KNOWLEDGE: &str = r#"[
    { "content": "Mario is a plumber from Brooklyn.", "source": "mario.pdf" },
    { "content": "Luigi is Mario's taller brother.", "source": "luigi.pdf" },
    { "content": "Zelda is a princess of Hyrule.", "source": "zelda.pdf" }
]"#;

/// Write a knowledge file and a config that points at it.
fn write_fixture(dir: &Path, extra: &str) -> std::path::PathBuf {
    let knowledge = dir.join("knowledge.json");
    std::fs::write(&knowledge, KNOWLEDGE).unwrap();

    let config = dir.join("config.toml");
    std::fs::write(
        &config,
        format!(
            r#"
[retrieval]
backend = "file"
knowledge_file = "{}"
{extra}

[completion]
provider = "openai"
api_url = "http://127.0.0.1:9/v1"

[prompt]
system_prompt_override = "You are Game Wizard. Answer only about games."
"#,
            knowledge.display().to_string().replace('\\', "/")
        ),
    )
    .unwrap();
    config
}

fn wizard_from(config: &AppConfig, provider: Arc<ScriptedProvider>) -> WizardAgent {
    let backends = build_from_config(config).unwrap();
    assert_eq!(backends.knowledge.name(), "in_memory");
    let backends = Backends {
        knowledge: backends.knowledge,
        completion: provider,
    };
    WizardAgent::from_config(config, backends).unwrap()
}

async fn post_json(app: axum::Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
}

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
}

// ── Pipeline ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_config_file_to_grounded_answer() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::load_from(&write_fixture(dir.path(), "")).unwrap();
    let provider = Arc::new(ScriptedProvider::new(&["Mario is a plumber."]));
    let wizard = wizard_from(&config, provider.clone());
    let mut history = ConversationHistory::new(config.history.capacity);

    let outcome = wizard
        .ask(&TurnRequest::new("Who is Mario?", "mistral-7b", 3), &mut history)
        .await
        .unwrap();

    assert_eq!(outcome.answer, "Mario is a plumber.");
    assert_eq!(outcome.top_source.as_deref(), Some("mario.pdf"));
    assert_eq!(outcome.chunks_retrieved, 3);
    // Lowest-ranked chunk (Zelda) left out, apostrophes stripped.
    assert_eq!(
        outcome.context,
        "Mario is a plumber from Brooklyn.Luigi is Marios taller brother."
    );

    let prompt = &provider.prompts()[0];
    assert!(prompt.starts_with("System Instructions:\nYou are Game Wizard. Answer only about games."));
    assert!(prompt.contains("Question:\nWho is Mario?"));
    assert!(!prompt.contains("Hyrule"));
}

#[tokio::test]
async fn e2e_knowledge_file_next_to_config() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("kb")).unwrap();
    std::fs::write(dir.path().join("kb/knowledge.json"), KNOWLEDGE).unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[retrieval]
backend = "file"
knowledge_file = "kb/knowledge.json"

[completion]
provider = "openai"
api_url = "http://127.0.0.1:9/v1"
"#,
    )
    .unwrap();

    // Loaded from a different working directory than the config file's.
    let config = AppConfig::load_from(&path).unwrap();
    let provider = Arc::new(ScriptedProvider::new(&["A plumber."]));
    let wizard = wizard_from(&config, provider);
    let mut history = ConversationHistory::default();

    let outcome = wizard
        .ask(&TurnRequest::new("Who is Mario?", "mistral-7b", 2), &mut history)
        .await
        .unwrap();
    assert_eq!(outcome.top_source.as_deref(), Some("mario.pdf"));
}

#[tokio::test]
async fn e2e_include_all_chunks_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), "drop_lowest_ranked = false");
    let config = AppConfig::load_from(&path).unwrap();
    let provider = Arc::new(ScriptedProvider::new(&["ok"]));
    let wizard = wizard_from(&config, provider);
    let mut history = ConversationHistory::default();

    let outcome = wizard
        .ask(&TurnRequest::new("Who is Mario?", "mistral-7b", 3), &mut history)
        .await
        .unwrap();

    assert!(outcome.context.ends_with("Zelda is a princess of Hyrule."));
}

#[tokio::test]
async fn e2e_follow_up_sees_previous_turn() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::load_from(&write_fixture(dir.path(), "")).unwrap();
    let provider = Arc::new(ScriptedProvider::new(&["A plumber.", "Luigi."]));
    let wizard = wizard_from(&config, provider.clone());
    let mut history = ConversationHistory::new(config.history.capacity);

    wizard
        .ask(&TurnRequest::new("Who is Mario?", "mistral-7b", 5), &mut history)
        .await
        .unwrap();
    wizard
        .ask(&TurnRequest::new("Who is his brother?", "mistral-7b", 5), &mut history)
        .await
        .unwrap();

    let prompts = provider.prompts();
    assert!(prompts[0].contains("Chat History:\n\n"));
    assert!(prompts[1].contains("Chat History:\nUser: Who is Mario?\nAI: A plumber.\n"));
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn e2e_history_is_bounded_over_a_long_session() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::load_from(&write_fixture(dir.path(), "")).unwrap();
    let provider = Arc::new(ScriptedProvider::new(&["ok"]));
    let wizard = wizard_from(&config, provider);
    let mut history = ConversationHistory::new(config.history.capacity);

    for i in 1..=16 {
        wizard
            .ask(&TurnRequest::new(format!("Mario question {i}"), "mistral-7b", 2), &mut history)
            .await
            .unwrap();
    }

    assert_eq!(history.len(), 14);
    let all = history.peek(14);
    assert_eq!(all[0].user_input(), "Mario question 3");
    assert_eq!(all[13].user_input(), "Mario question 16");
}

#[tokio::test]
async fn e2e_blank_question_never_reaches_backends() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::load_from(&write_fixture(dir.path(), "")).unwrap();
    let provider = Arc::new(ScriptedProvider::new(&["ok"]));
    let wizard = wizard_from(&config, provider.clone());
    let mut history = ConversationHistory::default();

    let err = wizard
        .ask(&TurnRequest::new(" \t ", "mistral-7b", 5), &mut history)
        .await
        .unwrap_err();

    assert!(matches!(err, AskError::EmptyQuestion));
    assert!(provider.prompts().is_empty());
    assert!(history.is_empty());
}

// ── HTTP ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_http_sessions_over_file_knowledge() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::load_from(&write_fixture(dir.path(), "")).unwrap();
    let provider = Arc::new(ScriptedProvider::new(&["first", "second", "third"]));
    let wizard = Arc::new(wizard_from(&config, provider));
    let state = Arc::new(ApiState::from_config(wizard, &config));

    let (status, first) = post_json(
        build_router(state.clone()),
        "/api/ask",
        serde_json::json!({ "question": "Who is Mario?" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["answer"], "first");
    assert_eq!(first["top_source"], "mario.pdf");
    let session = first["session_id"].as_str().unwrap().to_string();

    let (status, _) = post_json(
        build_router(state.clone()),
        "/api/ask",
        serde_json::json!({ "question": "And Luigi?", "session_id": session }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, other) = post_json(
        build_router(state.clone()),
        "/api/ask",
        serde_json::json!({ "question": "Who is Zelda?" }),
    )
    .await;
    assert_ne!(other["session_id"].as_str().unwrap(), session);

    let (status, history) =
        get_json(build_router(state.clone()), &format!("/api/history?session_id={session}")).await;
    assert_eq!(status, StatusCode::OK);
    let entries = history["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["ai_message"], "first");
    assert_eq!(entries[1]["user_input"], "And Luigi?");
}

#[tokio::test]
async fn e2e_http_backend_failure_reports_and_recovers() {
    let config = AppConfig::default();
    let wizard = Arc::new(
        WizardAgent::new(
            Arc::new(DownStore),
            Arc::new(ScriptedProvider::new(&["never"])),
            "sys",
        )
        .with_models(config.completion.models.clone()),
    );
    let state = Arc::new(ApiState::from_config(wizard, &config));

    let (status, body) = post_json(
        build_router(state.clone()),
        "/api/ask",
        serde_json::json!({ "question": "Who is Mario?", "session_id": "tab-1" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("token expired"));

    // The server keeps serving after a failed turn, without keeping the empty session.
    let (status, health) = get_json(build_router(state), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["sessions"], 0);
}
