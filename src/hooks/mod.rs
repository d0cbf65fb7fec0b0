//! Completion notifications.
//!
//! The session controller hands every partial and final artifact to a
//! [`CompletionHook`]. Hooks run inline on the controller task, so slow work
//! belongs in the hook's own spawned task or behind a timeout.

pub mod shell_command;

use async_trait::async_trait;
use tracing::info;

use crate::preview::Artifact;

pub use shell_command::ShellCommandHook;

#[async_trait]
pub trait CompletionHook: Send + Sync {
    async fn on_recording_complete(&self, artifact: &Artifact);
}

/// Adapts a plain closure into a hook.
pub struct CallbackHook<F> {
    callback: F,
}

impl<F> CallbackHook<F>
where
    F: Fn(&Artifact) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

#[async_trait]
impl<F> CompletionHook for CallbackHook<F>
where
    F: Fn(&Artifact) + Send + Sync,
{
    async fn on_recording_complete(&self, artifact: &Artifact) {
        (self.callback)(artifact);
    }
}

/// Logs every artifact. Used by the service when nothing else is configured.
pub struct LoggingHook;

#[async_trait]
impl CompletionHook for LoggingHook {
    async fn on_recording_complete(&self, artifact: &Artifact) {
        info!(
            "Recording artifact ready: {} bytes ({}, {})",
            artifact.len(),
            artifact.kind.as_str(),
            artifact.mime_type
        );
    }
}

/// Fans one notification out to several hooks, in order.
#[derive(Default)]
pub struct HookSet {
    hooks: Vec<Box<dyn CompletionHook>>,
}

impl HookSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hook: Box<dyn CompletionHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

#[async_trait]
impl CompletionHook for HookSet {
    async fn on_recording_complete(&self, artifact: &Artifact) {
        for hook in &self.hooks {
            hook.on_recording_complete(artifact).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_callback_hook_receives_artifact() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let hook = CallbackHook::new(move |artifact: &Artifact| {
            seen_clone.lock().unwrap().push(artifact.data.clone());
        });

        hook.on_recording_complete(&Artifact::partial(b"abc".to_vec(), "video/webm"))
            .await;

        assert_eq!(*seen.lock().unwrap(), vec![b"abc".to_vec()]);
    }

    #[tokio::test]
    async fn test_hook_set_fans_out_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let first = order.clone();
        let second = order.clone();

        let hooks = HookSet::new()
            .with(Box::new(CallbackHook::new(move |_: &Artifact| {
                first.lock().unwrap().push("first");
            })))
            .with(Box::new(LoggingHook))
            .with(Box::new(CallbackHook::new(move |_: &Artifact| {
                second.lock().unwrap().push("second");
            })));

        assert_eq!(hooks.len(), 3);
        hooks
            .on_recording_complete(&Artifact::partial(vec![1], "video/webm"))
            .await;

        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }
}
