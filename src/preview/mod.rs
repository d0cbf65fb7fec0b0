//! In-memory artifacts and the transient handles that expose them.
//!
//! A handle is the service-side equivalent of a browser object URL: it
//! references one artifact held in memory until it is revoked. The session
//! controller revokes every handle it supersedes, so the store never grows
//! beyond the clip currently on screen.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

const URL_PREFIX: &str = "blob:clipcam/";

/// Whether an artifact holds a single fragment or the whole recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Partial,
    Final,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Partial => "partial",
            ArtifactKind::Final => "final",
        }
    }
}

/// A playable binary blob tagged with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub kind: ArtifactKind,
}

impl Artifact {
    pub fn partial(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
            kind: ArtifactKind::Partial,
        }
    }

    /// Concatenate fragments in order into one final artifact.
    pub fn assemble<T: AsRef<[u8]>>(fragments: &[T], mime_type: impl Into<String>) -> Self {
        let total = fragments.iter().map(|f| f.as_ref().len()).sum();
        let mut data = Vec::with_capacity(total);
        for fragment in fragments {
            data.extend_from_slice(fragment.as_ref());
        }

        Self {
            data,
            mime_type: mime_type.into(),
            kind: ArtifactKind::Final,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Dereferenceable reference to an artifact held by [`PreviewStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewHandle {
    pub id: Uuid,
    pub url: String,
}

impl PreviewHandle {
    fn new() -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            url: format!("{URL_PREFIX}{id}"),
        }
    }
}

/// Thread-safe store of live handles, shared between the controller and the API.
#[derive(Clone, Default)]
pub struct PreviewStore {
    inner: Arc<Mutex<HashMap<Uuid, Arc<Artifact>>>>,
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an artifact and hand back a fresh handle for it.
    pub async fn create(&self, artifact: impl Into<Arc<Artifact>>) -> PreviewHandle {
        let artifact = artifact.into();
        let handle = PreviewHandle::new();
        debug!(
            "Created preview handle {} ({} bytes, {})",
            handle.url,
            artifact.len(),
            artifact.kind.as_str()
        );
        self.inner.lock().await.insert(handle.id, artifact);
        handle
    }

    pub async fn get(&self, id: &Uuid) -> Option<Arc<Artifact>> {
        self.inner.lock().await.get(id).cloned()
    }

    /// Release a handle. Returns false when it was already gone.
    pub async fn revoke(&self, handle: &PreviewHandle) -> bool {
        let removed = self.inner.lock().await.remove(&handle.id).is_some();
        if removed {
            debug!("Revoked preview handle {}", handle.url);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}
