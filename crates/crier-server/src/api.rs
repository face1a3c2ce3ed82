//! HTTP handlers for the voice session command surface.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Json,
};
use crier_types::VoiceParams;
use crier_voice::EngineError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::AppState;

/// Maps an [`EngineError`] to the correct HTTP status code, logging 5xx
/// causes.
fn engine_err_to_status(e: &EngineError) -> StatusCode {
    match e {
        EngineError::EmptyText | EngineError::TextTooLong { .. } => StatusCode::BAD_REQUEST,
        EngineError::NoActiveSession(_) => StatusCode::NOT_FOUND,
        EngineError::SessionClosed(_) => StatusCode::CONFLICT,
        EngineError::TransportUnavailable { .. } => {
            tracing::error!(error = %e, "voice transport unavailable");
            StatusCode::BAD_GATEWAY
        }
        EngineError::StoreUnavailable(_) => {
            tracing::error!(error = %e, "queue store unavailable");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[derive(Deserialize)]
pub struct SpeakRequest {
    pub text: String,
    pub requester_id: String,
    #[serde(default)]
    pub voice: Option<VoiceParams>,
}

#[derive(Serialize)]
pub struct SpeakResponse {
    pub request_id: i64,
}

/// POST /api/channels/{channelId}/join
pub async fn join_channel_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(channel_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    state
        .manager
        .join(&channel_id)
        .await
        .map_err(|e| engine_err_to_status(&e))?;

    let session_state = state.manager.session_state(&channel_id).await;
    Ok(Json(json!({
        "channel_id": channel_id,
        "state": session_state.map(|s| s.as_str()),
    })))
}

/// POST /api/channels/{channelId}/leave
///
/// Returns 202: the session finishes its current item before releasing the
/// voice channel, so the leave completes asynchronously.
pub async fn leave_channel_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(channel_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    state.manager.leave(&channel_id).await;
    (
        StatusCode::ACCEPTED,
        Json(json!({ "channel_id": channel_id })),
    )
}

/// POST /api/channels/{channelId}/speak
pub async fn speak_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(channel_id): Path<String>,
    Json(payload): Json<SpeakRequest>,
) -> Result<Json<SpeakResponse>, StatusCode> {
    let voice = payload.voice.unwrap_or_default();
    let request_id = state
        .manager
        .submit(&channel_id, &payload.text, &payload.requester_id, voice)
        .await
        .map_err(|e| engine_err_to_status(&e))?;

    Ok(Json(SpeakResponse { request_id }))
}

/// GET /api/channels/{channelId}/queue
///
/// Returns the channel's pending backlog oldest first, whether or not a
/// session is currently live.
pub async fn channel_queue_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(channel_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let session_state = state.manager.session_state(&channel_id).await;

    let pool = state.pool.clone();
    let channel = channel_id.clone();
    let pending = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
        crier_queue::pending_for_channel(&conn, &channel).map_err(|e| {
            tracing::error!(channel = %channel, error = %e, "failed to read channel queue");
            StatusCode::INTERNAL_SERVER_ERROR
        })
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    Ok(Json(json!({
        "channel_id": channel_id,
        "state": session_state.map(|s| s.as_str()),
        "pending": pending,
    })))
}

/// GET /api/channels
pub async fn list_sessions_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<Value> {
    let channels: Vec<Value> = state
        .manager
        .active_channels()
        .await
        .into_iter()
        .map(|(channel_id, session_state)| {
            json!({
                "channel_id": channel_id,
                "state": session_state.as_str(),
            })
        })
        .collect();

    Json(json!({ "channels": channels }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use crier_synth::{RetryPolicy, SynthesisClient, SynthesisError, Synthesizer};
    use crier_voice::{EngineConfig, LogNotifier, NullTransport, SessionManager};
    use std::time::Duration;
    use tower::ServiceExt;

    struct SilenceSynth;

    #[async_trait]
    impl Synthesizer for SilenceSynth {
        async fn synthesize(
            &self,
            _text: &str,
            _params: &VoiceParams,
        ) -> Result<Vec<u8>, SynthesisError> {
            Ok(vec![0u8; 3840])
        }
    }

    fn test_state(dir: &tempfile::TempDir) -> AppState {
        let db_path = dir.path().join("crier.db");
        let pool = crier_db::create_pool(
            db_path.to_str().expect("utf-8 path"),
            crier_db::DbSettings::default(),
        )
        .expect("should create pool");
        {
            let conn = pool.get().expect("should get connection");
            crier_db::run_migrations(&conn).expect("should migrate");
        }

        let synth = SynthesisClient::new(
            Arc::new(SilenceSynth),
            RetryPolicy {
                max_attempts: 1,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
            },
        );
        let manager = Arc::new(SessionManager::new(
            pool.clone(),
            synth,
            Arc::new(NullTransport),
            Arc::new(LogNotifier),
            EngineConfig::default(),
        ));

        AppState { pool, manager }
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("should read body");
        serde_json::from_slice(&body).expect("should be json")
    }

    #[tokio::test]
    async fn join_then_list_shows_the_channel() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let app = app(test_state(&dir));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/channels/general/join")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/channels")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let channels = json["channels"].as_array().expect("channels array");
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0]["channel_id"], "general");
    }

    #[tokio::test]
    async fn speak_persists_and_returns_request_id() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let app = app(test_state(&dir));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/channels/general/speak")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"text": "hello there", "requester_id": "user-1"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json["request_id"].as_i64().expect("request_id") >= 1);
    }

    #[tokio::test]
    async fn speak_rejects_blank_text() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let app = app(test_state(&dir));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/channels/general/speak")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"text": "   ", "requester_id": "user-1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn queue_endpoint_reports_channel_with_no_session() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let app = app(test_state(&dir));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/channels/quiet/queue")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["channel_id"], "quiet");
        assert!(json["state"].is_null());
        assert_eq!(json["pending"].as_array().expect("pending array").len(), 0);
    }

    #[tokio::test]
    async fn leave_is_accepted_even_without_a_session() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let app = app(test_state(&dir));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/channels/ghost/leave")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
}
