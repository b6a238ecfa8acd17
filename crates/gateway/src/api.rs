//! JSON API behind the web UI.
//!
//! Endpoints:
//!
//! - `GET    /api/models`                 Selectable models and defaults
//! - `POST   /api/ask`                    Ask the wizard a question
//! - `GET    /api/history?session_id=`    A session's conversation history
//! - `DELETE /api/history?session_id=`    Forget a session's history

use axum::{
    Router,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use gamewizard_agent::{TurnRequest, WizardAgent};
use gamewizard_config::MAX_RETRIEVAL_DEPTH;
use gamewizard_core::history::HistoryEntry;
use gamewizard_core::session::SessionId;

use crate::sessions::SessionStore;

/// Session ids longer than this are rejected.
const MAX_SESSION_ID_LEN: usize = 128;

/// Shared state for the API.
pub struct ApiState {
    pub agent: Arc<WizardAgent>,
    pub sessions: SessionStore,
    pub default_model: String,
    pub default_depth: usize,
    /// History turns replayed per question; the retrieval depth when `None`
    pub history_depth: Option<usize>,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

impl ApiState {
    pub fn from_config(agent: Arc<WizardAgent>, config: &gamewizard_config::AppConfig) -> Self {
        Self {
            agent,
            sessions: SessionStore::new(config.gateway.max_sessions, config.history.capacity),
            default_model: config.completion.default_model.clone(),
            default_depth: config.retrieval.default_depth,
            history_depth: config.history.prompt_depth,
            start_time: chrono::Utc::now(),
        }
    }
}

pub type SharedApiState = Arc<ApiState>;

/// Build the API router. Nest this under "/api" in the main router.
pub fn api_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/models", get(models_handler))
        .route("/ask", post(ask_handler))
        .route(
            "/history",
            get(get_history_handler).delete(clear_history_handler),
        )
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Deserialize)]
struct AskRequest {
    #[serde(default)]
    question: String,
    /// Existing session (omit to start a new one).
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    depth: Option<usize>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Serialize)]
struct AskResponse {
    session_id: String,
    answer: String,
    context: String,
    top_source: Option<String>,
    chunks_retrieved: usize,
    model: String,
}

#[derive(Serialize)]
struct ModelsResponse {
    models: Vec<String>,
    default_model: String,
    default_depth: usize,
    max_depth: usize,
}

#[derive(Deserialize)]
struct SessionQuery {
    session_id: String,
}

#[derive(Serialize)]
struct HistoryResponse {
    session_id: String,
    capacity: usize,
    created_at: Option<String>,
    entries: Vec<HistoryEntry>,
}

#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn parse_session_id(raw: Option<&str>) -> Result<SessionId, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(SessionId::new()),
        Some(id) if id.len() > MAX_SESSION_ID_LEN => Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("session_id longer than {MAX_SESSION_ID_LEN} characters"),
        )),
        Some(id) => Ok(SessionId::from(id)),
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn models_handler(State(state): State<SharedApiState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.agent.models().to_vec(),
        default_model: state.default_model.clone(),
        default_depth: state.default_depth,
        max_depth: MAX_RETRIEVAL_DEPTH,
    })
}

async fn ask_handler(
    State(state): State<SharedApiState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, ApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Malformed ask request");
        api_error(StatusCode::BAD_REQUEST, rejection.body_text())
    })?;
    let session_id = parse_session_id(payload.session_id.as_deref())?;

    let mut request = TurnRequest::new(
        payload.question,
        payload.model.unwrap_or_else(|| state.default_model.clone()),
        payload.depth.unwrap_or(state.default_depth),
    );
    request.history_depth = state.history_depth;

    // Rejected requests never create a session.
    if let Err(e) = state.agent.validate(&request) {
        warn!(session = %session_id, error = %e, "Rejected question");
        return Err(api_error(StatusCode::BAD_REQUEST, e.to_string()));
    }

    info!(
        session = %session_id,
        model = %request.model,
        depth = request.depth,
        "api/ask request"
    );

    let (history, created) = state.sessions.checkout(&session_id).await;
    let result = {
        // Held for the whole turn: one session answers one question at a time.
        let mut history = history.lock().await;
        state.agent.ask(&request, &mut history).await
    };

    match result {
        Ok(outcome) => Ok(Json(AskResponse {
            session_id: session_id.to_string(),
            answer: outcome.answer,
            context: outcome.context,
            top_source: outcome.top_source,
            chunks_retrieved: outcome.chunks_retrieved,
            model: outcome.model,
        })),
        Err(e) => {
            // A session whose first turn failed holds nothing and must not take a slot.
            if created {
                state.sessions.discard_if_empty(&session_id).await;
            }
            if e.is_user_error() {
                warn!(session = %session_id, error = %e, "Rejected question");
                Err(api_error(StatusCode::BAD_REQUEST, e.to_string()))
            } else {
                error!(session = %session_id, error = %e, "Question failed");
                Err(api_error(StatusCode::BAD_GATEWAY, e.to_string()))
            }
        }
    }
}

async fn get_history_handler(
    State(state): State<SharedApiState>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let session_id = parse_session_id(Some(query.session_id.as_str()))?;
    let history = state
        .sessions
        .get(&session_id)
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Unknown session"))?;

    let history = history.lock().await;
    Ok(Json(HistoryResponse {
        created_at: state
            .sessions
            .created_at(&session_id)
            .await
            .map(|t| t.to_rfc3339()),
        session_id: session_id.to_string(),
        capacity: history.capacity(),
        entries: history.iter().cloned().collect(),
    }))
}

async fn clear_history_handler(
    State(state): State<SharedApiState>,
    Query(query): Query<SessionQuery>,
) -> Result<StatusCode, ApiError> {
    let session_id = parse_session_id(Some(query.session_id.as_str()))?;
    let history = state
        .sessions
        .get(&session_id)
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Unknown session"))?;

    history.lock().await.clear();
    info!(session = %session_id, "History cleared");
    Ok(StatusCode::NO_CONTENT)
}
