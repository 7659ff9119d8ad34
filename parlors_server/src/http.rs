//! HTTP gateway: POST / → one conversation turn → JSON response.
//!
//! Request validation (400 for a missing `human_input` or malformed history),
//! 500 on internal failures, 502 when the remote model cannot answer.
//! Each request is limited by a timeout to avoid stuck connections.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::{get, post},
};
use parlors_conversation::{ConversationError, ConversationService, TurnOutcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::ServerError;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// New user text for this turn.
    #[serde(default)]
    pub human_input: Option<String>,
    /// State returned by the previous turn, replayed verbatim.
    #[serde(default)]
    pub history: Option<Value>,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: String,
    pub active_conversations: usize,
}

/// Shared state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ConversationService>,
    pub request_timeout: Duration,
}

/// Validate request body; returns the user input or a 400-class error.
///
/// Blank input is rejected by the conversation service itself.
pub fn validate_chat_request(body: &ChatRequest) -> Result<&str, ServerError> {
    body.human_input
        .as_deref()
        .ok_or_else(|| ConversationError::BadRequest("human_input is required".to_string()).into())
}

async fn handle_chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<TurnOutcome>, ServerError> {
    let Json(body) = body.map_err(|e| ServerError::InvalidBody(e.body_text()))?;
    let human_input = validate_chat_request(&body)?;

    let timeout = state.request_timeout;
    let outcome = tokio::time::timeout(
        timeout,
        state.service.respond(human_input, body.history.clone()),
    )
    .await
    .map_err(|_| {
        ConversationError::RemoteUnavailable(format!(
            "request timed out after {}ms",
            timeout.as_millis()
        ))
    })??;

    info!(
        "Served thread {} ({} turns)",
        outcome.history.thread_id(),
        outcome.history.prompt_list.len()
    );
    Ok(Json(outcome))
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        model: state.service.manager().config().model.clone(),
        active_conversations: state.service.store().len().await,
    })
}

/// Build the router (POST /, GET /health).
pub fn router(service: Arc<ConversationService>, request_timeout: Duration) -> Router {
    let state = AppState {
        service,
        request_timeout,
    };
    Router::new()
        .route("/", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server on `bind_addr` (e.g. `0.0.0.0:8000`).
/// Graceful shutdown on Ctrl+C (SIGINT) and SIGTERM (Unix); in-flight requests complete before exit.
pub async fn run_http(
    service: Arc<ConversationService>,
    bind_addr: &str,
    request_timeout: Duration,
) -> Result<()> {
    let app = router(service, request_timeout);
    let listener = TcpListener::bind(bind_addr).await?;
    info!(
        "parlors listening on {} (request_timeout={}s, Ctrl+C/SIGTERM to stop)",
        bind_addr,
        request_timeout.as_secs()
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("parlors stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
