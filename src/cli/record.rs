//! CLI handler for one-shot recordings.
//!
//! The finished clip goes to stdout so it can be redirected or piped;
//! logs stay on stderr.

use crate::app;
use crate::config::Config;
use anyhow::{bail, Context, Result};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::args::RecordCliArgs;

pub async fn handle_record_command(args: RecordCliArgs) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(mime_type) = args.mime_type {
        config.recorder.mime_type = mime_type;
    }

    let duration = args.seconds.map(Duration::from_secs);
    let Some(artifact) = app::record_clip(&config, duration).await? else {
        bail!("Nothing was recorded (is the camera available?)");
    };

    info!(
        "Writing {} bytes of {} to stdout",
        artifact.len(),
        artifact.mime_type
    );

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(&artifact.data)
        .await
        .context("Failed to write clip to stdout")?;
    stdout.flush().await?;
    Ok(())
}
