//! Recording control endpoints.
//!
//! Provides HTTP endpoints for:
//! - Starting and stopping recording (POST /start, POST /stop)
//! - Toggling recording (POST /toggle)
//! - Getting session status (GET /status)

use crate::api::error::{ApiError, ApiResult};
use crate::session::{SessionPhase, SessionStatusHandle};
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

/// What the session loop did with a command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandReply {
    pub phase: SessionPhase,
    pub message: String,
}

pub type CommandResponder = oneshot::Sender<anyhow::Result<CommandReply>>;

pub enum ApiCommand {
    StartRecording(CommandResponder),
    StopRecording(CommandResponder),
    ToggleRecording(CommandResponder),
}

impl ApiCommand {
    fn name(&self) -> &'static str {
        match self {
            ApiCommand::StartRecording(_) => "start",
            ApiCommand::StopRecording(_) => "stop",
            ApiCommand::ToggleRecording(_) => "toggle",
        }
    }
}

#[derive(Clone)]
pub struct RecordingState {
    pub tx: mpsc::Sender<ApiCommand>,
    pub status: SessionStatusHandle,
}

/// Creates the recording router with all recording-related endpoints.
pub fn router(state: RecordingState) -> Router {
    Router::new()
        .route("/start", post(start_recording))
        .route("/stop", post(stop_recording))
        .route("/toggle", post(toggle_recording))
        .route("/status", get(recording_status))
        .with_state(state)
}

async fn start_recording(State(state): State<RecordingState>) -> ApiResult<Json<Value>> {
    dispatch(&state, ApiCommand::StartRecording).await
}

async fn stop_recording(State(state): State<RecordingState>) -> ApiResult<Json<Value>> {
    dispatch(&state, ApiCommand::StopRecording).await
}

async fn toggle_recording(State(state): State<RecordingState>) -> ApiResult<Json<Value>> {
    dispatch(&state, ApiCommand::ToggleRecording).await
}

/// Sends a command to the session loop and waits for its reply.
async fn dispatch(
    state: &RecordingState,
    command: fn(CommandResponder) -> ApiCommand,
) -> ApiResult<Json<Value>> {
    let (reply_tx, reply_rx) = oneshot::channel();
    let command = command(reply_tx);
    info!("{} command received via API", command.name());

    if let Err(e) = state.tx.send(command).await {
        error!("Failed to send {} command: {}", e.0.name(), e);
        return Err(ApiError::unavailable("Recording service is not running"));
    }

    let reply = reply_rx
        .await
        .map_err(|_| ApiError::unavailable("Recording service dropped the request"))??;

    let status = state.status.get().await;
    Ok(Json(json!({
        "success": true,
        "phase": reply.phase.as_str(),
        "session_id": status.session_id,
        "message": reply.message,
    })))
}

/// Gets the current session status.
///
/// # Response
/// Returns JSON with the session phase, fragment counters, the current preview
/// handle and the size of the last finished clip.
async fn recording_status(State(state): State<RecordingState>) -> Json<Value> {
    let status = state.status.get().await;

    let preview = status.preview.as_ref().map(|handle| {
        json!({
            "id": handle.id,
            "url": handle.url,
            "inline": format!("/clips/{}", handle.id),
            "download": format!("/clips/{}/download", handle.id),
        })
    });

    Json(json!({
        "recording": status.phase == SessionPhase::Recording,
        "phase": status.phase.as_str(),
        "session_id": status.session_id,
        "duration_seconds": status.duration_seconds(),
        "fragment_count": status.fragment_count,
        "bytes_recorded": status.bytes_recorded,
        "preview": preview,
        "last_artifact_bytes": status.last_artifact_bytes,
        "last_error": status.last_error,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_toggle_round_trips_through_loop() {
        let (tx, mut rx) = mpsc::channel(4);
        let status = SessionStatusHandle::default();
        let app = router(RecordingState {
            tx,
            status: status.clone(),
        });

        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                if let ApiCommand::ToggleRecording(reply) = command {
                    let _ = reply.send(Ok(CommandReply {
                        phase: SessionPhase::Recording,
                        message: "Recording started".to_string(),
                    }));
                }
            }
        });

        let response = app
            .oneshot(
                Request::post("/toggle")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["phase"], "recording");
        assert_eq!(json["message"], "Recording started");
    }

    #[tokio::test]
    async fn test_command_error_becomes_500() {
        let (tx, mut rx) = mpsc::channel(4);
        let app = router(RecordingState {
            tx,
            status: SessionStatusHandle::default(),
        });

        tokio::spawn(async move {
            if let Some(ApiCommand::StartRecording(reply)) = rx.recv().await {
                let _ = reply.send(Err(anyhow::anyhow!("ffmpeg missing")));
            }
        });

        let response = app
            .oneshot(Request::post("/start").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"], true);
        assert_eq!(json["message"], "ffmpeg missing");
    }

    #[tokio::test]
    async fn test_closed_loop_is_unavailable() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let app = router(RecordingState {
            tx,
            status: SessionStatusHandle::default(),
        });

        let response = app
            .oneshot(Request::post("/stop").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_status_reports_idle() {
        let (tx, _rx) = mpsc::channel(1);
        let app = router(RecordingState {
            tx,
            status: SessionStatusHandle::default(),
        });

        let response = app
            .oneshot(Request::get("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let json = body_json(response).await;
        assert_eq!(json["recording"], false);
        assert_eq!(json["phase"], "idle");
        assert_eq!(json["fragment_count"], 0);
        assert!(json["preview"].is_null());
    }
}
