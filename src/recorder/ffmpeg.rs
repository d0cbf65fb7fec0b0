//! FFmpeg-backed recorder.
//!
//! Spawns ffmpeg against the capture devices and muxes straight to stdout.
//! The output pipe is sliced into fragments on a timer, or handed over in
//! one piece when the process exits if no timeslice is configured.

use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{FragmentSink, Recorder, RecorderError, RecorderOptions, SessionId};
use crate::capture::MediaStream;
use crate::config::RecorderConfig;

const READ_CHUNK: usize = 64 * 1024;

/// Output container, with a fixed codec preference per container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    WebM,
    Matroska,
    Mp4,
}

impl Container {
    /// Parse a MIME type, ignoring any `;codecs=...` parameters.
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "video/webm" => Some(Container::WebM),
            "video/x-matroska" | "video/matroska" => Some(Container::Matroska),
            "video/mp4" => Some(Container::Mp4),
            _ => None,
        }
    }

    pub fn muxer(&self) -> &'static str {
        match self {
            Container::WebM => "webm",
            Container::Matroska => "matroska",
            Container::Mp4 => "mp4",
        }
    }

    fn video_codec(&self) -> &'static str {
        match self {
            Container::WebM | Container::Matroska => "libvpx",
            Container::Mp4 => "libx264",
        }
    }

    fn audio_codec(&self) -> &'static str {
        match self {
            Container::WebM | Container::Matroska => "libopus",
            Container::Mp4 => "aac",
        }
    }

    fn encoder_args(&self) -> &'static [&'static str] {
        match self {
            Container::WebM | Container::Matroska => &["-deadline", "realtime", "-cpu-used", "8"],
            // mp4 has to be fragmented to be written to a pipe
            Container::Mp4 => &[
                "-preset",
                "veryfast",
                "-movflags",
                "frag_keyframe+empty_moov+default_base_moof",
            ],
        }
    }
}

/// Build the ffmpeg command line for one recording.
pub fn build_args(
    stream: &MediaStream,
    options: &RecorderOptions,
) -> Result<Vec<String>, RecorderError> {
    let container = Container::from_mime(&options.mime_type)
        .ok_or_else(|| RecorderError::UnsupportedFormat(options.mime_type.clone()))?;

    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    args.extend([
        "-f".to_string(),
        stream.video_input_format.clone(),
        "-i".to_string(),
        stream.video_device.clone(),
        "-f".to_string(),
        stream.audio_input_format.clone(),
        "-i".to_string(),
        stream.audio_device.clone(),
        "-map".to_string(),
        "0:v".to_string(),
        "-map".to_string(),
        "1:a".to_string(),
        "-c:v".to_string(),
        container.video_codec().to_string(),
    ]);

    if let Some(bits) = options.video_bits_per_second {
        args.extend(["-b:v".to_string(), bits.to_string()]);
    }

    args.extend(["-c:a".to_string(), container.audio_codec().to_string()]);
    args.extend(container.encoder_args().iter().map(|s| s.to_string()));
    args.extend([
        "-f".to_string(),
        container.muxer().to_string(),
        "pipe:1".to_string(),
    ]);

    Ok(args)
}

struct RunningEncoder {
    session: SessionId,
    child: Child,
    stdin: Option<ChildStdin>,
    output: JoinHandle<()>,
}

pub struct FfmpegRecorder {
    ffmpeg_path: Option<PathBuf>,
    stop_timeout: Duration,
    running: Option<RunningEncoder>,
}

impl FfmpegRecorder {
    pub fn from_config(config: &RecorderConfig) -> Self {
        let ffmpeg_path = if config.ffmpeg_path.is_empty() {
            None
        } else {
            Some(PathBuf::from(&config.ffmpeg_path))
        };

        Self {
            ffmpeg_path,
            stop_timeout: Duration::from_secs(config.stop_timeout_seconds),
            running: None,
        }
    }

    fn resolve_binary(&self) -> Result<PathBuf, RecorderError> {
        match &self.ffmpeg_path {
            Some(path) => Ok(path.clone()),
            None => which::which("ffmpeg").map_err(|_| RecorderError::EncoderNotFound),
        }
    }
}

#[async_trait]
impl Recorder for FfmpegRecorder {
    async fn start(
        &mut self,
        stream: &MediaStream,
        options: &RecorderOptions,
        sink: FragmentSink,
    ) -> Result<()> {
        if self.is_recording() {
            return Err(RecorderError::AlreadyRecording.into());
        }
        // Reap a previous run that ended on its own.
        if let Some(mut previous) = self.running.take() {
            if let Err(e) = previous.child.wait().await {
                debug!("Failed to reap previous ffmpeg run: {}", e);
            }
        }

        let args = build_args(stream, options)?;
        let binary = self.resolve_binary()?;
        debug!("Spawning {:?} {}", binary, args.join(" "));

        let mut child = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(RecorderError::Spawn)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("ffmpeg stdout was not captured"))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(log_stderr(stderr));
        }
        let stdin = child.stdin.take();

        let session = sink.session();
        let output = tokio::spawn(pump_output(stdout, sink, options.timeslice));

        info!(
            "ffmpeg recording started for session {} ({} from {})",
            session, options.mime_type, stream.id
        );

        self.running = Some(RunningEncoder {
            session,
            child,
            stdin,
            output,
        });
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        let Some(mut running) = self.running.take() else {
            debug!("ffmpeg recorder not running, nothing to stop");
            return Ok(());
        };

        // 'q' asks ffmpeg to finish the container cleanly
        if let Some(mut stdin) = running.stdin.take() {
            if let Err(e) = stdin.write_all(b"q").await {
                debug!("Failed to send quit to ffmpeg: {}", e);
            }
            // Drop stdin to signal EOF
        }

        match tokio::time::timeout(self.stop_timeout, running.child.wait()).await {
            Ok(Ok(status)) => {
                if !status.success() {
                    debug!("ffmpeg exited with {}", status);
                }
            }
            Ok(Err(e)) => warn!("Failed to wait for ffmpeg: {}", e),
            Err(_) => {
                warn!(
                    "ffmpeg did not stop within {}s, killing it",
                    self.stop_timeout.as_secs()
                );
                if let Err(e) = running.child.kill().await {
                    warn!("Failed to kill ffmpeg: {}", e);
                }
            }
        }

        // stdout reaches EOF once the process is gone; the pump flushes the
        // last fragment and sends Finished before it returns.
        if let Err(e) = running.output.await {
            warn!("ffmpeg output task failed: {}", e);
        }

        info!("ffmpeg recording stopped for session {}", running.session);
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.running
            .as_ref()
            .map(|running| !running.output.is_finished())
            .unwrap_or(false)
    }
}

async fn pump_output(mut stdout: ChildStdout, sink: FragmentSink, timeslice: Option<Duration>) {
    let mut ticker = timeslice.map(|period| {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    let mut pending: Vec<u8> = Vec::new();
    let mut buf = vec![0u8; READ_CHUNK];
    let mut failure = None;

    loop {
        tokio::select! {
            read = stdout.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => pending.extend_from_slice(&buf[..n]),
                Err(e) => {
                    failure = Some(format!("Failed to read ffmpeg output: {e}"));
                    break;
                }
            },
            _ = next_tick(&mut ticker) => {
                if !pending.is_empty() {
                    sink.fragment(std::mem::take(&mut pending));
                }
            }
        }
    }

    if !pending.is_empty() {
        sink.fragment(pending);
    }

    match failure {
        Some(message) => {
            warn!("{}", message);
            sink.failed(message);
        }
        None => sink.finished(),
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn log_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if !line.trim().is_empty() {
            warn!("ffmpeg: {}", line.trim());
        }
    }
}
