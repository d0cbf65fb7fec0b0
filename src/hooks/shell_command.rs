//! Runs a user-configured shell command for each completed artifact.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use super::CompletionHook;
use crate::config::HookConfig;
use crate::preview::{Artifact, ArtifactKind};

/// Environment variable names for artifact metadata passed to the command.
pub mod hook_env {
    pub const MIME_TYPE: &str = "CLIPCAM_MIME_TYPE";
    pub const ARTIFACT_KIND: &str = "CLIPCAM_ARTIFACT_KIND";
    pub const ARTIFACT_BYTES: &str = "CLIPCAM_ARTIFACT_BYTES";
}

/// Executes a shell command with artifact data.
/// - Pipes the artifact bytes to stdin
/// - Sets environment variables for artifact metadata
/// - Kills the process on timeout
/// - Non-zero exit code logs a warning, the session carries on
pub struct ShellCommandHook {
    command: String,
    timeout: Duration,
    notify_partial: bool,
}

impl ShellCommandHook {
    pub fn new(command: String, timeout_seconds: u64, notify_partial: bool) -> Self {
        Self {
            command,
            timeout: Duration::from_secs(timeout_seconds),
            notify_partial,
        }
    }

    /// `None` when no command is configured.
    pub fn from_config(config: &HookConfig) -> Option<Self> {
        if config.command.trim().is_empty() {
            return None;
        }
        Some(Self::new(
            config.command.clone(),
            config.timeout_seconds,
            config.notify_partial,
        ))
    }

    async fn run(&self, artifact: &Artifact) -> anyhow::Result<()> {
        let mut child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env(hook_env::MIME_TYPE, &artifact.mime_type)
            .env(hook_env::ARTIFACT_KIND, artifact.kind.as_str())
            .env(hook_env::ARTIFACT_BYTES, artifact.len().to_string())
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take();
        let run = async move {
            if let Some(mut stdin) = stdin {
                if let Err(e) = stdin.write_all(&artifact.data).await {
                    // the command may exit without reading its input
                    if e.kind() != std::io::ErrorKind::BrokenPipe {
                        warn!("Failed to write clip to completion hook: {}", e);
                    }
                }
                // Drop stdin to signal EOF
            }
            child.wait_with_output().await
        };

        // kill_on_drop handles cleanup on timeout
        match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(output)) => {
                if output.status.success() {
                    let stdout = String::from_utf8_lossy(&output.stdout);
                    if !stdout.is_empty() {
                        info!("Completion hook stdout: {}", stdout.trim());
                    }
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    warn!(
                        "Completion hook exited with status {}: {}",
                        output.status,
                        stderr.trim()
                    );
                }
            }
            Ok(Err(e)) => warn!("Completion hook failed to execute: {}", e),
            Err(_) => warn!(
                "Completion hook timed out after {}s (process will be killed)",
                self.timeout.as_secs()
            ),
        }

        Ok(())
    }
}

#[async_trait]
impl CompletionHook for ShellCommandHook {
    async fn on_recording_complete(&self, artifact: &Artifact) {
        if artifact.kind == ArtifactKind::Partial && !self.notify_partial {
            return;
        }

        info!(
            "Running completion hook for {} artifact: {}",
            artifact.kind.as_str(),
            self.command
        );
        if let Err(e) = self.run(artifact).await {
            warn!("Completion hook could not be started: {}", e);
        }
    }
}
