//! REST API server for clipcam.
//!
//! Provides HTTP endpoints for:
//! - Recording control (start, stop, toggle, status)
//! - Inline preview and download of recorded clips

pub mod error;
pub mod routes;

use crate::config::Config;
use crate::preview::PreviewStore;
use crate::session::SessionStatusHandle;
use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tracing::info;

pub use routes::clips::ClipState;
pub use routes::recording::{ApiCommand, CommandReply, RecordingState};

pub struct ApiServer {
    port: u16,
    recording_state: RecordingState,
    clip_state: ClipState,
}

impl ApiServer {
    pub fn new(
        tx: tokio::sync::mpsc::Sender<ApiCommand>,
        status: SessionStatusHandle,
        previews: PreviewStore,
        config: &Config,
    ) -> Self {
        Self {
            port: config.api.port,
            recording_state: RecordingState {
                tx,
                status: status.clone(),
            },
            clip_state: ClipState {
                previews,
                status,
                download_filename: config.recorder.download_filename.clone(),
            },
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            // Root and version endpoints
            .route("/", get(status))
            .route("/version", get(version))
            // Recording control endpoints
            .merge(routes::recording::router(self.recording_state.clone()))
            // Preview and download
            .merge(routes::clips::router(self.clip_state.clone()))
            .layer(ServiceBuilder::new())
    }

    pub async fn start(self) -> Result<()> {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(&format!("127.0.0.1:{}", self.port)).await?;

        info!("API server listening on http://127.0.0.1:{}", self.port);
        info!("Endpoints:");
        info!("  GET  /                    - Service info");
        info!("  GET  /version             - Get version info");
        info!("  POST /start               - Start recording");
        info!("  POST /stop                - Stop recording");
        info!("  POST /toggle              - Toggle recording");
        info!("  GET  /status              - Get session status");
        info!("  GET  /preview             - Current preview clip");
        info!("  GET  /clips/:id           - Play a clip inline");
        info!("  GET  /clips/:id/download  - Download a clip");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "clipcam",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "clipcam"
    }))
}
