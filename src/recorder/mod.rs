//! Recorder abstraction: turns a live stream into encoded fragments over time.
//!
//! Recorders never touch session state. They push [`RecorderEvent`]s into a
//! [`FragmentSink`] and the session controller consumes them on its own task,
//! in the order they were sent.

pub mod ffmpeg;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::capture::MediaStream;
use crate::config::RecorderConfig;

pub use ffmpeg::{Container, FfmpegRecorder};

/// Identifies one start→stop cycle.
pub type SessionId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    /// A chunk of encoded output.
    Fragment { session: SessionId, data: Vec<u8> },
    /// End of stream. Always sent after the last fragment of the session.
    Finished { session: SessionId },
    /// The recorder gave up. Also terminates the session's event stream.
    Failed { session: SessionId, message: String },
}

impl RecorderEvent {
    pub fn session(&self) -> SessionId {
        match self {
            RecorderEvent::Fragment { session, .. }
            | RecorderEvent::Finished { session }
            | RecorderEvent::Failed { session, .. } => *session,
        }
    }
}

/// Listener handed to a recorder on start, bound to a single session.
#[derive(Debug, Clone)]
pub struct FragmentSink {
    session: SessionId,
    tx: mpsc::UnboundedSender<RecorderEvent>,
}

impl FragmentSink {
    pub fn new(session: SessionId, tx: mpsc::UnboundedSender<RecorderEvent>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn fragment(&self, data: Vec<u8>) {
        self.send(RecorderEvent::Fragment {
            session: self.session,
            data,
        });
    }

    pub fn finished(&self) {
        self.send(RecorderEvent::Finished {
            session: self.session,
        });
    }

    pub fn failed(&self, message: impl Into<String>) {
        self.send(RecorderEvent::Failed {
            session: self.session,
            message: message.into(),
        });
    }

    fn send(&self, event: RecorderEvent) {
        if self.tx.send(event).is_err() {
            debug!("Session {} listener is gone, dropping event", self.session);
        }
    }
}

/// Per-session recorder settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderOptions {
    pub mime_type: String,
    /// `None` leaves the encoder at its own default.
    pub video_bits_per_second: Option<u32>,
    /// `None` emits one fragment when the stream ends.
    pub timeslice: Option<Duration>,
}

impl RecorderOptions {
    pub fn from_config(config: &RecorderConfig) -> Self {
        Self {
            mime_type: config.mime_type.clone(),
            video_bits_per_second: config
                .apply_video_bitrate
                .then_some(config.video_bits_per_second),
            timeslice: (config.timeslice_ms > 0)
                .then(|| Duration::from_millis(config.timeslice_ms)),
        }
    }
}

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("ffmpeg was not found on PATH; install it or set recorder.ffmpeg_path")]
    EncoderNotFound,
    #[error("unsupported recording format: {0}")]
    UnsupportedFormat(String),
    #[error("recorder is already running")]
    AlreadyRecording,
    #[error("failed to spawn encoder: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Trait for stream recorders.
///
/// `stop` finalizes the recording: any buffered output is delivered as a last
/// fragment, followed by `Finished`, before `stop` returns.
#[async_trait]
pub trait Recorder: Send {
    async fn start(
        &mut self,
        stream: &MediaStream,
        options: &RecorderOptions,
        sink: FragmentSink,
    ) -> Result<()>;

    async fn stop(&mut self) -> Result<()>;

    fn is_recording(&self) -> bool;
}
