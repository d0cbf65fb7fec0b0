//! Session status types and shared state handle.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::preview::PreviewHandle;

/// Phase of a recording session.
///
/// `Finalizing` covers the gap between a stop request and the recorder's
/// end of stream. The session is already inactive there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Recording,
    Finalizing,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Finalizing => "finalizing",
        }
    }
}

/// Current session state, readable by API handlers.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub session_id: Option<Uuid>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub fragment_count: usize,
    pub bytes_recorded: usize,
    pub preview: Option<PreviewHandle>,
    pub last_artifact_bytes: Option<usize>,
    pub last_error: Option<String>,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Idle,
            session_id: None,
            started_at: None,
            fragment_count: 0,
            bytes_recorded: 0,
            preview: None,
            last_artifact_bytes: None,
            last_error: None,
        }
    }
}

impl SessionStatus {
    /// Seconds since the session started.
    pub fn duration_seconds(&self) -> Option<u64> {
        self.started_at.map(|started| {
            let elapsed = chrono::Utc::now() - started;
            elapsed.num_seconds().max(0) as u64
        })
    }
}

/// Thread-safe handle for sharing session state between the controller and API handlers.
#[derive(Clone, Default)]
pub struct SessionStatusHandle {
    inner: Arc<Mutex<SessionStatus>>,
}

impl SessionStatusHandle {
    pub async fn get(&self) -> SessionStatus {
        self.inner.lock().await.clone()
    }

    pub async fn start_recording(&self, session_id: Uuid) {
        let mut status = self.inner.lock().await;
        *status = SessionStatus {
            phase: SessionPhase::Recording,
            session_id: Some(session_id),
            started_at: Some(chrono::Utc::now()),
            ..SessionStatus::default()
        };
    }

    pub async fn record_fragment(&self, bytes: usize, preview: PreviewHandle) {
        let mut status = self.inner.lock().await;
        status.fragment_count += 1;
        status.bytes_recorded += bytes;
        status.preview = Some(preview);
    }

    pub async fn set_phase(&self, phase: SessionPhase) {
        let mut status = self.inner.lock().await;
        status.phase = phase;
    }

    pub async fn finish(&self, preview: Option<PreviewHandle>, artifact_bytes: Option<usize>) {
        let mut status = self.inner.lock().await;
        status.phase = SessionPhase::Idle;
        if preview.is_some() {
            status.preview = preview;
        }
        status.last_artifact_bytes = artifact_bytes;
    }

    pub async fn set_error(&self, error: String) {
        let mut status = self.inner.lock().await;
        status.last_error = Some(error);
    }

    pub async fn reset(&self) {
        let mut status = self.inner.lock().await;
        *status = SessionStatus::default();
    }
}
