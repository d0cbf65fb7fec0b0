//! Clip playback and download endpoints.
//!
//! Handles are only valid while the session controller keeps them; a
//! superseded clip answers 404.

use crate::api::error::{ApiError, ApiResult};
use crate::preview::{Artifact, PreviewStore};
use crate::session::SessionStatusHandle;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use uuid::Uuid;

#[derive(Clone)]
pub struct ClipState {
    pub previews: PreviewStore,
    pub status: SessionStatusHandle,
    pub download_filename: String,
}

/// Creates the router serving recorded clips.
pub fn router(state: ClipState) -> Router {
    Router::new()
        .route("/preview", get(current_preview))
        .route("/clips/:id", get(inline_clip))
        .route("/clips/:id/download", get(download_clip))
        .with_state(state)
}

/// Serves whatever the current preview handle points at.
async fn current_preview(State(state): State<ClipState>) -> ApiResult<Response> {
    let status = state.status.get().await;
    let handle = status
        .preview
        .ok_or_else(|| ApiError::not_found("Nothing recorded yet"))?;

    let artifact = lookup(&state, &handle.id).await?;
    Ok(artifact_response(&artifact, "inline".to_string()))
}

async fn inline_clip(
    State(state): State<ClipState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let artifact = lookup(&state, &id).await?;
    Ok(artifact_response(&artifact, "inline".to_string()))
}

async fn download_clip(
    State(state): State<ClipState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let artifact = lookup(&state, &id).await?;
    let disposition = format!("attachment; filename=\"{}\"", state.download_filename);
    Ok(artifact_response(&artifact, disposition))
}

async fn lookup(state: &ClipState, id: &Uuid) -> ApiResult<std::sync::Arc<Artifact>> {
    state
        .previews
        .get(id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("Clip {id} not found or no longer available")))
}

fn artifact_response(artifact: &Artifact, disposition: String) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, artifact.mime_type.clone()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.data.clone(),
    )
        .into_response()
}
