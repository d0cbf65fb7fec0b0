use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub recorder: RecorderConfig,
    pub capture: CaptureConfig,
    pub api: ApiConfig,
    pub hook: HookConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Container MIME type of the recorded clip.
    pub mime_type: String,
    /// Target video bitrate. Always accepted, only passed to the encoder
    /// when `apply_video_bitrate` is set.
    pub video_bits_per_second: u32,
    pub apply_video_bitrate: bool,
    /// Fragment interval in milliseconds. 0 delivers a single fragment at stop.
    pub timeslice_ms: u64,
    /// Fire the completion hook for every fragment as well as for the final clip.
    pub notify_fragments: bool,
    pub download_filename: String,
    /// Empty resolves `ffmpeg` on PATH.
    pub ffmpeg_path: String,
    pub stop_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub video_device: String,
    pub video_input_format: String,
    pub audio_device: String,
    pub audio_input_format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    /// Shell command run for each completed artifact.
    /// Receives the clip bytes via stdin.
    /// Env vars: CLIPCAM_MIME_TYPE, CLIPCAM_ARTIFACT_KIND, CLIPCAM_ARTIFACT_BYTES
    pub command: String,
    /// Also run the command for per-fragment partial artifacts.
    pub notify_partial: bool,
    pub timeout_seconds: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            mime_type: "video/webm".to_string(),
            video_bits_per_second: 1_000_000, // 1 Mbps
            apply_video_bitrate: false,
            timeslice_ms: 0,
            notify_fragments: true,
            download_filename: "recorded-video.webm".to_string(),
            ffmpeg_path: String::new(),
            stop_timeout_seconds: 10,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            video_device: "/dev/video0".to_string(),
            video_input_format: "v4l2".to_string(),
            audio_device: "default".to_string(),
            audio_input_format: "pulse".to_string(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { port: 3838 }
    }
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            notify_partial: false,
            timeout_seconds: 60,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}
