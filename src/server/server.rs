use anyhow::Result;
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::info;

use crate::config::AppConfig;
use crate::events::Broadcaster;
use crate::notifications::NotificationStore;

use super::sse::sse_stream;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct ServerState {
    pub store: Arc<NotificationStore>,
    pub broadcaster: Arc<Broadcaster>,
    pub heartbeat_interval_secs: u64,
}

/// Errors surfaced to API clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Notification not found")]
    NotFound,
    #[error("Invalid notification payload: {0}")]
    InvalidPayload(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "detail": self.to_string() })),
            )
                .into_response(),
            ApiError::InvalidPayload(_) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": [self.to_string()] })),
            )
                .into_response(),
        }
    }
}

#[derive(Deserialize)]
struct NotifyRequest {
    #[serde(default)]
    id: Option<String>,
    data: Map<String, Value>,
}

#[derive(Serialize)]
struct NotifyResponse {
    success: bool,
    id: String,
}

#[derive(Serialize)]
struct DeleteResponse {
    success: bool,
    message: String,
}

#[derive(Deserialize)]
struct DeleteParams {
    id: Option<String>,
}

async fn notify(
    State(state): State<ServerState>,
    Json(request): Json<NotifyRequest>,
) -> Result<Json<NotifyResponse>, ApiError> {
    if !request
        .data
        .get("message")
        .map(Value::is_string)
        .unwrap_or(false)
    {
        return Err(ApiError::InvalidPayload(
            "data.message is required and must be a string".to_string(),
        ));
    }
    let id = state.store.add(request.data, request.id);
    Ok(Json(NotifyResponse { success: true, id }))
}

async fn get_notifications(State(state): State<ServerState>) -> Response {
    Json(state.store.list()).into_response()
}

/// Delete notifications, all if no id provided, a specific one if id given.
async fn delete_notifications(
    State(state): State<ServerState>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<DeleteResponse>, ApiError> {
    match params.id {
        Some(id) => {
            if state.store.delete_by_id(&id) {
                Ok(Json(DeleteResponse {
                    success: true,
                    message: format!("Notification {} deleted", id),
                }))
            } else {
                Err(ApiError::NotFound)
            }
        }
        None => {
            state.store.clear_all();
            Ok(Json(DeleteResponse {
                success: true,
                message: "All notifications cleared".to_string(),
            }))
        }
    }
}

async fn events(
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Heartbeats are protocol-level events here, so axum's own keep-alive
    // comments are not used.
    Sse::new(sse_stream(
        &state.store,
        state.broadcaster.clone(),
        state.heartbeat_interval_secs,
    ))
}

pub fn make_app(state: ServerState, frontend_dir_path: Option<PathBuf>) -> Router {
    let mut app = Router::new()
        .route("/api/notify", post(notify))
        .route(
            "/api/notifications",
            get(get_notifications).delete(delete_notifications),
        )
        .route("/events", get(events))
        .with_state(state)
        .layer(CorsLayer::permissive());

    if let Some(dir) = frontend_dir_path {
        app = app.fallback_service(ServeDir::new(dir));
    }
    app
}

pub async fn run_server(
    state: ServerState,
    config: &AppConfig,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = make_app(state, config.frontend_dir_path.clone());

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}
