//! Terminal presenter: writes the message word by word at a speaking pace.

use crate::playback::{PlaybackError, Presenter};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

const PREFIX: &str = "< ";

pub struct TerminalPresenter<W = tokio::io::Stdout> {
    out: Arc<Mutex<W>>,
    /// Delay after each word; zero writes the whole text at once.
    word_delay: Duration,
}

impl TerminalPresenter<tokio::io::Stdout> {
    pub fn stdout(words_per_minute: u32) -> Self {
        Self::new(tokio::io::stdout(), words_per_minute)
    }
}

impl<W> TerminalPresenter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(out: W, words_per_minute: u32) -> Self {
        let word_delay = if words_per_minute == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(60_000 / u64::from(words_per_minute))
        };
        Self {
            out: Arc::new(Mutex::new(out)),
            word_delay,
        }
    }

    /// Shared handle to the writer (tests read back what was presented).
    pub fn output(&self) -> Arc<Mutex<W>> {
        Arc::clone(&self.out)
    }
}

#[async_trait]
impl<W> Presenter for TerminalPresenter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn present(&self, text: &str) -> Result<(), PlaybackError> {
        let mut out = self.out.lock().await;
        out.write_all(PREFIX.as_bytes()).await?;
        if self.word_delay.is_zero() {
            out.write_all(text.as_bytes()).await?;
        } else {
            for word in text.split_inclusive(char::is_whitespace) {
                out.write_all(word.as_bytes()).await?;
                out.flush().await?;
                tokio::time::sleep(self.word_delay).await;
            }
        }
        out.write_all(b"\n").await?;
        out.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_the_whole_text_with_prefix() {
        let p = TerminalPresenter::new(Vec::<u8>::new(), 0);
        p.present("Hi there!").await.unwrap();
        let out = p.output();
        let buf = out.lock().await;
        assert_eq!(String::from_utf8_lossy(&buf), "< Hi there!\n");
    }

    #[tokio::test]
    async fn paced_output_keeps_whitespace() {
        let p = TerminalPresenter::new(Vec::<u8>::new(), 60_000);
        p.present("a node\nholds  data").await.unwrap();
        let out = p.output();
        let buf = out.lock().await;
        assert_eq!(String::from_utf8_lossy(&buf), "< a node\nholds  data\n");
    }
}
