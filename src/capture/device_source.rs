//! Camera/microphone capture backed by local device nodes.

use std::path::Path;
use tracing::debug;

use super::capture_source::{CaptureSource, MediaStream};
use crate::config::CaptureConfig;

pub struct DeviceCaptureSource {
    video_device: String,
    video_input_format: String,
    audio_device: String,
    audio_input_format: String,
}

impl DeviceCaptureSource {
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self {
            video_device: config.video_device.clone(),
            video_input_format: config.video_input_format.clone(),
            audio_device: config.audio_device.clone(),
            audio_input_format: config.audio_input_format.clone(),
        }
    }

    /// Only device-node inputs can be checked up front. Anything else
    /// (network URLs, desktop grabbers) is handed to the recorder as is.
    fn video_available(&self) -> bool {
        if self.video_device.is_empty() {
            return false;
        }
        if self.video_device.starts_with("/dev/") {
            return Path::new(&self.video_device).exists();
        }
        true
    }
}

impl CaptureSource for DeviceCaptureSource {
    fn stream(&self) -> Option<MediaStream> {
        if !self.video_available() {
            debug!("Video device {} is not available", self.video_device);
            return None;
        }

        Some(MediaStream {
            id: format!("{}+{}", self.video_device, self.audio_device),
            video_device: self.video_device.clone(),
            video_input_format: self.video_input_format.clone(),
            audio_device: self.audio_device.clone(),
            audio_input_format: self.audio_input_format.clone(),
        })
    }
}
