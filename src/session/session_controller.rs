//! Recording session controller.
//!
//! Owns the session state (capture flag, fragments, preview handle) and sits
//! between a [`CaptureSource`] and a [`Recorder`]:
//! start → recorder produces fragments → stop → recorder ends the stream →
//! fragments are assembled into one clip → completion hook.
//!
//! All state changes go through `&mut self`, so whoever owns the controller
//! serializes fragment handling. Recorder events arrive on the channel whose
//! sender is passed to [`SessionController::new`]; the owner feeds them back
//! in through [`SessionController::handle_event`].

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::status::{SessionPhase, SessionStatusHandle};
use crate::capture::CaptureSource;
use crate::config::RecorderConfig;
use crate::hooks::CompletionHook;
use crate::preview::{Artifact, PreviewHandle, PreviewStore};
use crate::recorder::{FragmentSink, Recorder, RecorderEvent, RecorderOptions, SessionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub recorder: RecorderOptions,
    /// Notify the hook with each single-fragment partial artifact as well as
    /// with the final clip.
    pub notify_fragments: bool,
}

impl SessionOptions {
    pub fn from_config(config: &RecorderConfig) -> Self {
        Self {
            recorder: RecorderOptions::from_config(config),
            notify_fragments: config.notify_fragments,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&RecorderConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started(SessionId),
    /// No capture stream was available. Nothing changed.
    NoStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The recorder was told to finalize; the final clip follows its end of stream.
    Stopping(SessionId),
    NotRecording,
}

struct RecordingSession {
    id: SessionId,
    active: bool,
    finalized: bool,
    fragments: Vec<Vec<u8>>,
    format: String,
}

impl RecordingSession {
    fn new(id: SessionId, format: String) -> Self {
        Self {
            id,
            active: true,
            finalized: false,
            fragments: Vec::new(),
            format,
        }
    }
}

pub struct SessionController {
    capture: Box<dyn CaptureSource>,
    recorder: Box<dyn Recorder>,
    hook: Option<Box<dyn CompletionHook>>,
    options: SessionOptions,
    previews: PreviewStore,
    status: SessionStatusHandle,
    events: mpsc::UnboundedSender<RecorderEvent>,
    session: Option<RecordingSession>,
    preview: Option<PreviewHandle>,
}

impl SessionController {
    pub fn new(
        capture: Box<dyn CaptureSource>,
        recorder: Box<dyn Recorder>,
        options: SessionOptions,
        events: mpsc::UnboundedSender<RecorderEvent>,
    ) -> Self {
        Self {
            capture,
            recorder,
            hook: None,
            options,
            previews: PreviewStore::default(),
            status: SessionStatusHandle::default(),
            events,
            session: None,
            preview: None,
        }
    }

    pub fn with_hook(mut self, hook: Box<dyn CompletionHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn with_previews(mut self, previews: PreviewStore) -> Self {
        self.previews = previews;
        self
    }

    pub fn with_status(mut self, status: SessionStatusHandle) -> Self {
        self.status = status;
        self
    }

    /// Start a new session, superseding any previous one.
    pub async fn start(&mut self) -> Result<StartOutcome> {
        let Some(stream) = self.capture.stream() else {
            warn!("No capture stream available, ignoring start");
            return Ok(StartOutcome::NoStream);
        };

        if self.recorder.is_recording() {
            info!("Superseding the running session");
            if let Err(e) = self.recorder.stop().await {
                warn!("Failed to stop superseded recorder: {}", e);
            }
        }
        self.discard_session().await;

        let id = Uuid::new_v4();
        match self.options.recorder.video_bits_per_second {
            Some(bits) => debug!("Applying video bitrate of {} bps", bits),
            None => debug!("Video bitrate accepted but not applied"),
        }

        let sink = FragmentSink::new(id, self.events.clone());
        if let Err(e) = self
            .recorder
            .start(&stream, &self.options.recorder, sink)
            .await
        {
            error!("Failed to start recorder: {}", e);
            self.status.set_error(e.to_string()).await;
            return Err(e);
        }

        self.session = Some(RecordingSession::new(
            id,
            self.options.recorder.mime_type.clone(),
        ));
        self.status.start_recording(id).await;

        info!("Session {} recording from {}", id, stream.id);
        Ok(StartOutcome::Started(id))
    }

    /// Ask the recorder to finalize the active session.
    pub async fn stop(&mut self) -> Result<StopOutcome> {
        let id = match self.session.as_mut() {
            Some(session) if session.active => {
                session.active = false;
                session.id
            }
            _ => {
                debug!("Stop requested with no active session");
                return Ok(StopOutcome::NotRecording);
            }
        };

        self.status.set_phase(SessionPhase::Finalizing).await;
        info!("Session {} stopping", id);

        if let Err(e) = self.recorder.stop().await {
            // The recorder may never send its end of stream now, so close
            // the session with what has arrived so far.
            warn!("Recorder failed to stop cleanly: {}", e);
            self.status.set_error(e.to_string()).await;
            self.finalize().await;
        }

        Ok(StopOutcome::Stopping(id))
    }

    /// Start when idle, stop when recording.
    pub async fn toggle(&mut self) -> Result<SessionPhase> {
        if self.is_active() {
            self.stop().await?;
        } else {
            self.start().await?;
        }
        Ok(self.phase())
    }

    /// Apply one recorder event. Events from superseded or already
    /// finalized sessions are dropped.
    pub async fn handle_event(&mut self, event: RecorderEvent) {
        let current = self
            .session
            .as_ref()
            .filter(|session| !session.finalized)
            .map(|session| session.id);

        if current != Some(event.session()) {
            debug!("Ignoring event from stale session {}", event.session());
            return;
        }

        match event {
            RecorderEvent::Fragment { data, .. } => self.on_fragment(data).await,
            RecorderEvent::Finished { .. } => self.finalize().await,
            RecorderEvent::Failed { message, .. } => {
                error!("Recorder failed: {}", message);
                self.status.set_error(message).await;
                self.finalize().await;
            }
        }
    }

    async fn on_fragment(&mut self, data: Vec<u8>) {
        if data.is_empty() {
            debug!("Ignoring empty fragment");
            return;
        }

        let partial = {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            session.fragments.push(data.clone());
            debug!(
                "Session {} fragment {} ({} bytes)",
                session.id,
                session.fragments.len(),
                data.len()
            );
            Arc::new(Artifact::partial(data, session.format.clone()))
        };

        let handle = self.replace_preview(partial.clone()).await;
        self.status.record_fragment(partial.len(), handle).await;

        if self.options.notify_fragments {
            self.notify(&partial).await;
        }
    }

    /// Close the session: assemble every fragment, in arrival order, into the
    /// final clip. Runs at most once per session.
    async fn finalize(&mut self) {
        let assembled = {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            if session.finalized {
                return;
            }
            session.active = false;
            session.finalized = true;

            if session.fragments.is_empty() {
                info!("Session {} ended without data", session.id);
                None
            } else {
                Some(Arc::new(Artifact::assemble(
                    &session.fragments,
                    session.format.clone(),
                )))
            }
        };

        let Some(artifact) = assembled else {
            self.status.finish(None, None).await;
            return;
        };

        let handle = self.replace_preview(artifact.clone()).await;
        info!(
            "Recording complete: {} bytes available at {}",
            artifact.len(),
            handle.url
        );
        self.status.finish(Some(handle), Some(artifact.len())).await;
        self.notify(&artifact).await;
    }

    async fn replace_preview(&mut self, artifact: Arc<Artifact>) -> PreviewHandle {
        let handle = self.previews.create(artifact).await;
        if let Some(previous) = self.preview.replace(handle.clone()) {
            self.previews.revoke(&previous).await;
        }
        handle
    }

    async fn discard_session(&mut self) {
        if let Some(previous) = self.preview.take() {
            self.previews.revoke(&previous).await;
        }
        if let Some(session) = self.session.take() {
            debug!(
                "Discarding session {} ({} fragments)",
                session.id,
                session.fragments.len()
            );
        }
    }

    async fn notify(&self, artifact: &Artifact) {
        if let Some(hook) = &self.hook {
            hook.on_recording_complete(artifact).await;
        }
    }

    /// Stop any running recorder. Used on shutdown.
    pub async fn shutdown(&mut self) {
        if self.recorder.is_recording() {
            if let Err(e) = self.recorder.stop().await {
                warn!("Failed to stop recorder on shutdown: {}", e);
            }
        }
    }

    pub fn phase(&self) -> SessionPhase {
        match &self.session {
            Some(session) if session.active => SessionPhase::Recording,
            Some(session) if !session.finalized => SessionPhase::Finalizing,
            _ => SessionPhase::Idle,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(|session| session.active)
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|session| session.id)
    }

    pub fn fragments(&self) -> &[Vec<u8>] {
        self.session
            .as_ref()
            .map(|session| session.fragments.as_slice())
            .unwrap_or_default()
    }

    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.preview.as_ref()
    }

    pub fn previews(&self) -> &PreviewStore {
        &self.previews
    }

    pub fn status(&self) -> &SessionStatusHandle {
        &self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::MediaStream;
    use crate::hooks::CallbackHook;
    use crate::preview::ArtifactKind;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedCapture(Option<MediaStream>);

    impl CaptureSource for FixedCapture {
        fn stream(&self) -> Option<MediaStream> {
            self.0.clone()
        }
    }

    fn camera() -> FixedCapture {
        FixedCapture(Some(MediaStream {
            id: "test-cam".to_string(),
            video_device: "/dev/video0".to_string(),
            video_input_format: "v4l2".to_string(),
            audio_device: "default".to_string(),
            audio_input_format: "pulse".to_string(),
        }))
    }

    #[derive(Default)]
    struct FakeState {
        sink: Option<FragmentSink>,
        starts: usize,
        stops: usize,
        last_options: Option<RecorderOptions>,
    }

    /// Hands its sink to the test; flushes `tail` as the last fragment on stop.
    struct FakeRecorder {
        state: Arc<Mutex<FakeState>>,
        tail: Option<Vec<u8>>,
        fail_start: bool,
    }

    #[async_trait]
    impl Recorder for FakeRecorder {
        async fn start(
            &mut self,
            _stream: &MediaStream,
            options: &RecorderOptions,
            sink: FragmentSink,
        ) -> Result<()> {
            if self.fail_start {
                anyhow::bail!("encoder unavailable");
            }
            let mut state = self.state.lock().unwrap();
            state.starts += 1;
            state.last_options = Some(options.clone());
            state.sink = Some(sink);
            Ok(())
        }

        async fn stop(&mut self) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state.stops += 1;
            if let Some(sink) = state.sink.take() {
                if let Some(tail) = &self.tail {
                    sink.fragment(tail.clone());
                }
                sink.finished();
            }
            Ok(())
        }

        fn is_recording(&self) -> bool {
            self.state.lock().unwrap().sink.is_some()
        }
    }

    struct Harness {
        controller: SessionController,
        events: mpsc::UnboundedReceiver<RecorderEvent>,
        recorder: Arc<Mutex<FakeState>>,
        seen: Arc<Mutex<Vec<Artifact>>>,
    }

    impl Harness {
        fn new(capture: FixedCapture, options: SessionOptions) -> Self {
            Self::with_recorder(capture, options, None, false)
        }

        fn with_recorder(
            capture: FixedCapture,
            options: SessionOptions,
            tail: Option<Vec<u8>>,
            fail_start: bool,
        ) -> Self {
            let (tx, events) = mpsc::unbounded_channel();
            let recorder = Arc::new(Mutex::new(FakeState::default()));
            let seen = Arc::new(Mutex::new(Vec::new()));
            let seen_clone = seen.clone();

            let controller = SessionController::new(
                Box::new(capture),
                Box::new(FakeRecorder {
                    state: recorder.clone(),
                    tail,
                    fail_start,
                }),
                options,
                tx,
            )
            .with_hook(Box::new(CallbackHook::new(move |artifact: &Artifact| {
                seen_clone.lock().unwrap().push(artifact.clone());
            })));

            Self {
                controller,
                events,
                recorder,
                seen,
            }
        }

        fn push(&self, data: &[u8]) {
            let state = self.recorder.lock().unwrap();
            state.sink.as_ref().unwrap().fragment(data.to_vec());
        }

        async fn drain(&mut self) {
            while let Ok(event) = self.events.try_recv() {
                self.controller.handle_event(event).await;
            }
        }

        fn seen(&self) -> Vec<Artifact> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[tokio::test]
    async fn test_fragments_then_final_notification() {
        let mut h = Harness::new(camera(), SessionOptions::default());

        assert!(matches!(
            h.controller.start().await.unwrap(),
            StartOutcome::Started(_)
        ));
        h.push(b"AAAAA");
        h.push(b"BBB");
        h.drain().await;
        h.controller.stop().await.unwrap();
        h.drain().await;

        let seen = h.seen();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].data, b"AAAAA");
        assert_eq!(seen[0].kind, ArtifactKind::Partial);
        assert_eq!(seen[1].data, b"BBB");
        assert_eq!(seen[2].data, b"AAAAABBB");
        assert_eq!(seen[2].kind, ArtifactKind::Final);
        assert_eq!(seen[2].mime_type, "video/webm");
        assert_eq!(h.controller.phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn test_flushed_tail_lands_before_final() {
        let mut h = Harness::with_recorder(
            camera(),
            SessionOptions::default(),
            Some(b"tail".to_vec()),
            false,
        );

        h.controller.start().await.unwrap();
        h.push(b"head-");
        h.controller.stop().await.unwrap();
        assert!(!h.controller.is_active());
        assert_eq!(h.controller.phase(), SessionPhase::Finalizing);
        h.drain().await;

        let seen = h.seen();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[1].data, b"tail");
        assert_eq!(seen[2].data, b"head-tail");
    }

    #[tokio::test]
    async fn test_empty_fragment_is_ignored() {
        let mut h = Harness::new(camera(), SessionOptions::default());

        h.controller.start().await.unwrap();
        h.push(b"");
        h.drain().await;

        assert!(h.seen().is_empty());
        assert!(h.controller.fragments().is_empty());
    }

    #[tokio::test]
    async fn test_start_without_stream_changes_nothing() {
        let mut h = Harness::new(FixedCapture(None), SessionOptions::default());

        assert_eq!(h.controller.start().await.unwrap(), StartOutcome::NoStream);
        assert!(!h.controller.is_active());
        assert!(h.controller.fragments().is_empty());
        assert!(h.controller.session_id().is_none());
        assert_eq!(h.recorder.lock().unwrap().starts, 0);
        h.drain().await;
        assert!(h.seen().is_empty());
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let mut h = Harness::new(camera(), SessionOptions::default());

        assert_eq!(
            h.controller.stop().await.unwrap(),
            StopOutcome::NotRecording
        );
        assert_eq!(h.recorder.lock().unwrap().stops, 0);
        assert!(h.seen().is_empty());
    }

    #[tokio::test]
    async fn test_stop_without_fragments_sends_nothing() {
        let mut h = Harness::new(camera(), SessionOptions::default());

        h.controller.start().await.unwrap();
        h.controller.stop().await.unwrap();
        h.drain().await;

        assert!(h.seen().is_empty());
        assert!(h.controller.preview().is_none());
        assert_eq!(h.controller.phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn test_restart_discards_previous_fragments() {
        let mut h = Harness::new(camera(), SessionOptions::default());

        h.controller.start().await.unwrap();
        h.push(b"old");
        h.drain().await;

        h.controller.start().await.unwrap();
        assert!(h.controller.fragments().is_empty());
        assert!(h.controller.preview().is_none());
        // the superseded run was stopped; its end of stream is ignored
        h.drain().await;
        assert_eq!(h.recorder.lock().unwrap().stops, 1);
        assert_eq!(h.controller.phase(), SessionPhase::Recording);

        h.push(b"new");
        h.drain().await;
        h.controller.stop().await.unwrap();
        h.drain().await;

        let seen = h.seen();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2].data, b"new");
    }

    #[tokio::test]
    async fn test_stale_session_events_are_dropped() {
        let mut h = Harness::new(camera(), SessionOptions::default());

        h.controller.start().await.unwrap();
        let stale = h.recorder.lock().unwrap().sink.clone().unwrap();
        h.controller.start().await.unwrap();
        h.drain().await;

        stale.fragment(b"ghost".to_vec());
        h.drain().await;

        assert!(h.controller.fragments().is_empty());
        assert!(h.seen().is_empty());
    }

    #[tokio::test]
    async fn test_final_only_mode() {
        let options = SessionOptions {
            notify_fragments: false,
            ..SessionOptions::default()
        };
        let mut h = Harness::new(camera(), options);

        h.controller.start().await.unwrap();
        h.push(b"one");
        h.push(b"two");
        h.drain().await;
        assert!(h.seen().is_empty());
        // preview still follows the latest fragment
        assert!(h.controller.preview().is_some());

        h.controller.stop().await.unwrap();
        h.drain().await;

        let seen = h.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].data, b"onetwo");
    }

    #[tokio::test]
    async fn test_superseded_previews_are_revoked() {
        let mut h = Harness::new(camera(), SessionOptions::default());

        for _ in 0..3 {
            h.controller.start().await.unwrap();
            h.push(b"a");
            h.push(b"b");
            h.drain().await;
            h.controller.stop().await.unwrap();
            h.drain().await;
            assert_eq!(h.controller.previews().len().await, 1);
        }

        let handle = h.controller.preview().unwrap().clone();
        let artifact = h.controller.previews().get(&handle.id).await.unwrap();
        assert_eq!(artifact.data, b"ab");
        assert_eq!(artifact.kind, ArtifactKind::Final);

        h.controller.start().await.unwrap();
        assert!(h.controller.previews().is_empty().await);
    }

    #[tokio::test]
    async fn test_recorder_finishing_on_its_own_finalizes() {
        let mut h = Harness::new(camera(), SessionOptions::default());

        h.controller.start().await.unwrap();
        h.push(b"xyz");
        let sink = h.recorder.lock().unwrap().sink.take().unwrap();
        sink.failed("device unplugged");
        h.drain().await;

        assert!(!h.controller.is_active());
        let seen = h.seen();
        assert_eq!(seen.last().unwrap().data, b"xyz");
        assert_eq!(seen.last().unwrap().kind, ArtifactKind::Final);

        let status = h.controller.status().get().await;
        assert_eq!(status.last_error.as_deref(), Some("device unplugged"));
        assert_eq!(status.last_artifact_bytes, Some(3));
    }

    #[tokio::test]
    async fn test_recorder_start_failure_leaves_idle() {
        let mut h = Harness::with_recorder(camera(), SessionOptions::default(), None, true);

        assert!(h.controller.start().await.is_err());
        assert!(!h.controller.is_active());
        assert_eq!(h.controller.phase(), SessionPhase::Idle);
        let status = h.controller.status().get().await;
        assert_eq!(status.last_error.as_deref(), Some("encoder unavailable"));
    }

    #[tokio::test]
    async fn test_toggle_cycles_phases() {
        let mut h = Harness::new(camera(), SessionOptions::default());

        assert_eq!(
            h.controller.toggle().await.unwrap(),
            SessionPhase::Recording
        );
        assert_eq!(
            h.controller.toggle().await.unwrap(),
            SessionPhase::Finalizing
        );
        h.drain().await;
        assert_eq!(h.controller.phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn test_recorder_receives_configured_options() {
        let config = RecorderConfig {
            mime_type: "video/mp4".to_string(),
            apply_video_bitrate: true,
            ..RecorderConfig::default()
        };
        let mut h = Harness::new(camera(), SessionOptions::from_config(&config));

        h.controller.start().await.unwrap();
        let options = h.recorder.lock().unwrap().last_options.clone().unwrap();
        assert_eq!(options.mime_type, "video/mp4");
        assert_eq!(options.video_bits_per_second, Some(1_000_000));
    }
}
