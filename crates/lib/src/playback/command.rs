//! Speech through an external program (e.g. `espeak`, `say`).
//! No shell is used; the text is passed as the last argument to avoid injection.

use crate::playback::{PlaybackError, Presenter};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct CommandPresenter {
    program: String,
    args: Vec<String>,
}

impl CommandPresenter {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn command(&self, text: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Presenter for CommandPresenter {
    /// Waits for the program to exit. Dropping the future kills the child.
    async fn present(&self, text: &str) -> Result<(), PlaybackError> {
        let output = self
            .command(text)
            .output()
            .await
            .map_err(|e| PlaybackError::Spawn(format!("{}: {}", self.program, e)))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(PlaybackError::Exit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn cancel(&self) {
        log::debug!("playback: {} cancelled", self.program);
    }
}
