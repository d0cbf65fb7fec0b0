//! Capture source abstraction for live camera/microphone streams.

use serde::{Deserialize, Serialize};

/// A live audio+video stream owned by the capture hardware.
///
/// The controller only reads it; the source decides how long it lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaStream {
    pub id: String,
    pub video_device: String,
    pub video_input_format: String,
    pub audio_device: String,
    pub audio_input_format: String,
}

/// Trait for anything that can hand out a live capture stream.
///
/// Returns `None` while no stream is available (device missing, permission
/// denied, not yet opened). Callers treat that as "nothing to record".
pub trait CaptureSource: Send + Sync {
    fn stream(&self) -> Option<MediaStream>;
}
