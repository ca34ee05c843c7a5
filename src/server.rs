//! HTTP surface and router assembly.
//!
//! `/ws` upgrades into the session coordinator; the rest is a small REST
//! surface for room lifecycle and operational visibility.

use axum::{
    extract::{Path, State, WebSocketUpgrade},
    http::{header::HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::handler;
use crate::state::CoordinatorState;

/// Build the application router.
pub fn router(state: CoordinatorState) -> Router {
    let cors = match state
        .config
        .frontend_origin
        .as_deref()
        .map(HeaderValue::from_str)
    {
        Some(Ok(origin)) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers(Any),
        Some(Err(_)) => {
            tracing::warn!("Invalid frontend origin, allowing any origin");
            permissive_cors()
        }
        None => permissive_cors(),
    };

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/rooms", post(create_room_handler))
        .route("/rooms/:room_id", axum::routing::delete(delete_room_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn permissive_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any)
}

// ── Route Handlers ────────────────────────────────────────────────────────────

/// WebSocket upgrade handler for client connections.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<CoordinatorState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handler::handle_websocket(socket, state))
}

/// Health check endpoint.
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "tandem-session",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Statistics endpoint.
async fn stats_handler(State(state): State<CoordinatorState>) -> impl IntoResponse {
    Json(json!({
        "connections": state.dispatcher.connection_count(),
        "active_rooms": state.presence.room_count(),
        "tracked_sessions": state.sessions.len(),
        "chat_logs": state.chat.len(),
        "rooms_with_state": state.room_state.len(),
        "timestamp": chrono::Utc::now().timestamp_millis(),
    }))
}

/// Create a room with a fresh short identifier.
async fn create_room_handler(State(state): State<CoordinatorState>) -> impl IntoResponse {
    let room_id = generate_room_id();
    match state.documents.create_room(&room_id).await {
        Ok(document) => {
            tracing::info!(room_id = document.room_id.as_str(), "Room created");
            (
                StatusCode::CREATED,
                Json(json!({
                    "message": "Room created",
                    "roomId": document.room_id,
                })),
            )
        }
        Err(e) => {
            tracing::error!(room_id = room_id.as_str(), "Room creation failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Room creation failed" })),
            )
        }
    }
}

/// Delete a room: drops the document and every in-memory trace (chat logs,
/// whiteboard snapshot, active tool).
async fn delete_room_handler(
    Path(room_id): Path<String>,
    State(state): State<CoordinatorState>,
) -> impl IntoResponse {
    if let Err(e) = state.documents.delete_room(&room_id).await {
        tracing::error!(room_id = room_id.as_str(), "Room deletion failed: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "Room deletion failed" })),
        );
    }
    state.purge_room(&room_id);
    tracing::info!(room_id = room_id.as_str(), "Room deleted");
    (StatusCode::OK, Json(json!({ "message": "Room deleted" })))
}

/// Six-hex-character room identifier.
fn generate_room_id() -> String {
    Uuid::new_v4().simple().to_string().chars().take(6).collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
