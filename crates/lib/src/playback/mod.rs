//! Playback collaborators: present one assistant message and resolve when done.
//!
//! The runtime runs at most one presentation at a time and releases the playback gate
//! when the future resolves, whatever the outcome.

mod command;
mod terminal;

pub use command::CommandPresenter;
pub use terminal::TerminalPresenter;

use crate::config::PlaybackConfig;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("failed to start speech program: {0}")]
    Spawn(String),
    #[error("speech program exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Presents (speaks, animates, prints) a message.
#[async_trait]
pub trait Presenter: Send + Sync {
    /// Resolves exactly once, when the presentation of `text` has finished.
    async fn present(&self, text: &str) -> Result<(), PlaybackError>;

    /// Called when a running presentation is abandoned (new chat). The presentation
    /// future itself is dropped by the caller.
    fn cancel(&self) {}
}

/// Finishes immediately without output.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentPresenter;

#[async_trait]
impl Presenter for SilentPresenter {
    async fn present(&self, _text: &str) -> Result<(), PlaybackError> {
        Ok(())
    }
}

/// Build the configured presenter: a speech program when one is set, the terminal otherwise.
pub fn presenter(config: &PlaybackConfig) -> Arc<dyn Presenter> {
    match &config.command {
        Some(cmd) if !cmd.program.trim().is_empty() => {
            log::info!("playback: speaking through {}", cmd.program);
            Arc::new(CommandPresenter::new(cmd.program.trim(), cmd.args.clone()))
        }
        _ => Arc::new(TerminalPresenter::stdout(config.words_per_minute)),
    }
}
