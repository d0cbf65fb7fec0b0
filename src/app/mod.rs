use crate::api::{ApiCommand, ApiServer, CommandReply};
use crate::capture::DeviceCaptureSource;
use crate::config::Config;
use crate::hooks::{CompletionHook, HookSet, LoggingHook, ShellCommandHook};
use crate::preview::{Artifact, PreviewStore};
use crate::recorder::{FfmpegRecorder, RecorderEvent};
use crate::session::{
    SessionController, SessionOptions, SessionPhase, SessionStatusHandle, StartOutcome,
    StopOutcome,
};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub async fn run_service() -> Result<()> {
    info!("Starting clipcam service");

    let config = Config::load()?;

    let (tx, rx) = mpsc::channel::<ApiCommand>(10);
    let (events_tx, events_rx) = mpsc::unbounded_channel::<RecorderEvent>();

    let previews = PreviewStore::new();
    let status_handle = SessionStatusHandle::default();
    let controller = build_controller(&config, events_tx)
        .with_hook(build_hooks(&config))
        .with_previews(previews.clone())
        .with_status(status_handle.clone());

    let api_server = ApiServer::new(tx, status_handle, previews, &config);
    tokio::spawn(async move {
        if let Err(e) = api_server.start().await {
            error!("API server failed: {}", e);
        }
    });

    info!("clipcam is ready!");
    info!(
        "Toggle recording with: curl -X POST http://127.0.0.1:{}/toggle",
        config.api.port
    );

    run_session_loop(controller, rx, events_rx).await;
    Ok(())
}

/// Owns the controller and applies API commands and recorder events until
/// the command channel closes or Ctrl-C.
///
/// Pending recorder events always go before the next command, so a stopped
/// session is finalized before a new start can supersede it.
pub async fn run_session_loop(
    mut controller: SessionController,
    mut commands: mpsc::Receiver<ApiCommand>,
    mut events: mpsc::UnboundedReceiver<RecorderEvent>,
) {
    loop {
        tokio::select! {
            biased;
            Some(event) = events.recv() => controller.handle_event(event).await,
            command = commands.recv() => match command {
                Some(command) => handle_command(&mut controller, command).await,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    controller.shutdown().await;
    // the recorder has flushed by now; finalize whatever it sent
    while let Ok(event) = events.try_recv() {
        controller.handle_event(event).await;
    }
}

async fn handle_command(controller: &mut SessionController, command: ApiCommand) {
    match command {
        ApiCommand::StartRecording(reply) => {
            let result = controller.start().await.map(|outcome| {
                let message = match outcome {
                    StartOutcome::Started(_) => "Recording started",
                    StartOutcome::NoStream => "No capture stream available",
                };
                reply_for(controller.phase(), message)
            });
            log_outcome("start", &result);
            let _ = reply.send(result);
        }
        ApiCommand::StopRecording(reply) => {
            let result = controller.stop().await.map(|outcome| {
                let message = match outcome {
                    StopOutcome::Stopping(_) => "Recording stopped, finalizing clip",
                    StopOutcome::NotRecording => "Not recording",
                };
                reply_for(controller.phase(), message)
            });
            log_outcome("stop", &result);
            let _ = reply.send(result);
        }
        ApiCommand::ToggleRecording(reply) => {
            let result = controller.toggle().await.map(|phase| {
                let message = match phase {
                    SessionPhase::Recording => "Recording started",
                    SessionPhase::Finalizing => "Recording stopped, finalizing clip",
                    SessionPhase::Idle => "Recording idle",
                };
                reply_for(phase, message)
            });
            log_outcome("toggle", &result);
            let _ = reply.send(result);
        }
    }
}

fn reply_for(phase: SessionPhase, message: &str) -> CommandReply {
    CommandReply {
        phase,
        message: message.to_string(),
    }
}

fn log_outcome(name: &str, result: &Result<CommandReply>) {
    match result {
        Ok(reply) => info!("{}: {} ({})", name, reply.message, reply.phase.as_str()),
        Err(e) => error!("Failed to {} recording: {}", name, e),
    }
}

/// Record a single clip. Stops after `duration`, or on Ctrl-C when `None`.
/// Returns the final artifact, if anything was recorded.
pub async fn record_clip(config: &Config, duration: Option<Duration>) -> Result<Option<Artifact>> {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<RecorderEvent>();
    let mut controller = build_controller(config, events_tx).with_hook(build_hooks(config));

    if controller.start().await? == StartOutcome::NoStream {
        warn!(
            "No capture stream available from {}",
            config.capture.video_device
        );
        return Ok(None);
    }

    let stop_signal = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    };
    tokio::pin!(stop_signal);

    loop {
        tokio::select! {
            _ = &mut stop_signal, if controller.is_active() => {
                controller.stop().await?;
            }
            event = events_rx.recv() => match event {
                Some(event) => controller.handle_event(event).await,
                None => break,
            },
        }

        if controller.phase() == SessionPhase::Idle {
            break;
        }
    }

    let artifact = match controller.preview() {
        Some(handle) => controller.previews().get(&handle.id).await,
        None => None,
    };
    Ok(artifact.map(Arc::unwrap_or_clone))
}

fn build_controller(
    config: &Config,
    events: mpsc::UnboundedSender<RecorderEvent>,
) -> SessionController {
    SessionController::new(
        Box::new(DeviceCaptureSource::from_config(&config.capture)),
        Box::new(FfmpegRecorder::from_config(&config.recorder)),
        SessionOptions::from_config(&config.recorder),
        events,
    )
}

fn build_hooks(config: &Config) -> Box<dyn CompletionHook> {
    let mut hooks = HookSet::new().with(Box::new(LoggingHook));
    if let Some(shell) = ShellCommandHook::from_config(&config.hook) {
        info!("Completion hook command: {}", config.hook.command);
        hooks = hooks.with(Box::new(shell));
    }
    Box::new(hooks)
}
