//! HTTP command channel
//!
//! Exposes the dispatcher mailbox to out-of-process UI collaborators. Each
//! request to `/command` is one protocol message and yields one response.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rewrite_core::{
    Command, CommandResponse, DispatcherHandle, FilterRule, MemoryFilterEngine, RewriteError,
    State as RuleState,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub handle: DispatcherHandle,
    pub engine: Arc<MemoryFilterEngine>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub url: String,
    pub redirect: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/command", post(command_handler))
        .route("/state", get(state_handler))
        .route("/rules", get(rules_handler))
        .route("/preview", post(preview_handler))
        .with_state(state)
}

/// Serve the command channel on an already bound listener
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    info!("Command channel listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn command_handler(
    State(state): State<AppState>,
    Json(message): Json<Value>,
) -> (StatusCode, Json<CommandResponse>) {
    respond(state.handle.send(message).await)
}

async fn state_handler(State(state): State<AppState>) -> (StatusCode, Json<CommandResponse>) {
    respond(state.handle.command(Command::GetState).await)
}

async fn rules_handler(State(state): State<AppState>) -> Json<Vec<FilterRule>> {
    Json(state.engine.installed().await)
}

async fn preview_handler(
    State(state): State<AppState>,
    Json(request): Json<PreviewRequest>,
) -> Json<PreviewResponse> {
    let redirect = state.engine.evaluate(&request.url).await;
    Json(PreviewResponse {
        url: request.url,
        redirect,
    })
}

/// Refused commands are the caller's fault (400); anything else is the
/// backend's (500), or the mailbox being gone (503).
fn status_for(err: &RewriteError) -> StatusCode {
    match err {
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        RewriteError::ChannelClosed => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond(result: rewrite_core::Result<RuleState>) -> (StatusCode, Json<CommandResponse>) {
    match result {
        Ok(state) => (StatusCode::OK, Json(CommandResponse::State(state))),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                error!("Command failed: {}", e);
            }
            (status, Json(CommandResponse::error(e.to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_for_error_classes() {
        assert_eq!(
            status_for(&RewriteError::invalid_pattern("(", "unclosed group")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&RewriteError::UnknownCommand { kind: None }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&RewriteError::Storage("disk full".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&RewriteError::FilterEngine("quota".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&RewriteError::ChannelClosed),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
