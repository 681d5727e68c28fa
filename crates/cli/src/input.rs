//! Line input that tolerates bytes which are not UTF-8.

use std::borrow::Cow;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

pub struct LineReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
        }
    }

    /// Next line without its line ending; None at end of input. Invalid UTF-8 is
    /// replaced with U+FFFD instead of failing the read.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        if self.inner.read_until(b'\n', &mut self.buf).await? == 0 {
            return Ok(None);
        }
        let line = match String::from_utf8_lossy(&self.buf) {
            Cow::Borrowed(s) => s.to_string(),
            Cow::Owned(s) => {
                log::warn!("input line was not valid UTF-8; unreadable bytes were replaced");
                s
            }
        };
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }
}
