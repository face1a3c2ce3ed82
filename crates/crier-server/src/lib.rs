//! Crier server library logic.

pub mod api;
pub mod config;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use crier_db::DbPool;
use crier_voice::SessionManager;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// The voice session manager.
    pub manager: Arc<SessionManager>,
}

/// Maximum request body size (64 KiB). A speak payload is short text plus
/// voice parameters; anything larger is rejected before deserialization.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/channels", get(api::list_sessions_handler))
        .route(
            "/api/channels/{channelId}/join",
            post(api::join_channel_handler),
        )
        .route(
            "/api/channels/{channelId}/leave",
            post(api::leave_channel_handler),
        )
        .route("/api/channels/{channelId}/speak", post(api::speak_handler))
        .route(
            "/api/channels/{channelId}/queue",
            get(api::channel_queue_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
