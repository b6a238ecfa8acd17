//! HTTP server for Game Wizard.
//!
//! Serves the single-page chat UI, a small JSON API that answers questions
//! through the wizard agent, and a health check. Every browser tab gets its
//! own session and with it its own conversation history.
//!
//! Built on Axum.

pub mod api;
pub mod frontend;
pub mod sessions;

use axum::extract::DefaultBodyLimit;
use axum::{Router, extract::State, response::Json, routing::get};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use gamewizard_agent::WizardAgent;

pub use api::{ApiState, SharedApiState};

/// Build the full router: health check, JSON API and embedded frontend.
pub fn build_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state.clone())
        .nest("/api", api::api_router(state))
        .merge(frontend::frontend_router())
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the HTTP server.
///
/// Knowledge store and completion provider are built once and shared by
/// every session.
pub async fn start(config: gamewizard_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let backends = gamewizard_providers::build_from_config(&config)?;
    let agent = Arc::new(WizardAgent::from_config(&config, backends)?);
    let state = Arc::new(ApiState::from_config(agent, &config));

    let app = build_router(state);

    info!(
        addr = %addr,
        model = %config.completion.default_model,
        retrieval = %config.retrieval.backend,
        "Game Wizard listening"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: i64,
    sessions: usize,
    knowledge: String,
    completion: String,
}

async fn health_handler(State(state): State<SharedApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: (chrono::Utc::now() - state.start_time).num_seconds(),
        sessions: state.sessions.len().await,
        knowledge: state.agent.knowledge().name().to_string(),
        completion: state.agent.completion().name().to_string(),
    })
}
