//! AI-response collaborators: the tutor server protocol and a direct Ollama backend.
//!
//! The chat core only sees [`ReplySource`]; which backend sits behind it comes from config.

mod ollama;
mod server;

pub use ollama::{ChatMessage, ChatResponse, OllamaClient, OllamaModel};
pub use server::{ServerReply, ServerUtterance, TutorServerClient};

pub use crate::chat::ReplyError;

use crate::chat::{Message, Utterance};
use crate::config::{self, BackendConfig, BackendKind};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

impl From<reqwest::Error> for ReplyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ReplyError::Decode(e.to_string())
        } else {
            ReplyError::Network(e.to_string())
        }
    }
}

/// Produces the assistant's reply to one user message.
#[async_trait]
pub trait ReplySource: Send + Sync {
    /// `context` is the transcript before `text` was sent, oldest first.
    async fn request_reply(
        &self,
        text: &str,
        context: &[Message],
    ) -> Result<Vec<Utterance>, ReplyError>;
}

/// Build the configured backend. `persona` becomes the system prompt where the backend takes one.
pub fn reply_source(backend: &BackendConfig, persona: Option<String>) -> Arc<dyn ReplySource> {
    let timeout = Duration::from_secs(backend.request_timeout_secs.max(1));
    match backend.kind {
        BackendKind::Server => {
            let url = config::resolve_server_url(backend);
            log::info!("reply backend: tutor server at {}", url);
            Arc::new(TutorServerClient::new(Some(url), timeout))
        }
        BackendKind::Ollama => {
            let model = config::resolve_model(backend);
            log::info!("reply backend: ollama, model {}", model);
            Arc::new(
                OllamaClient::new(backend.ollama_url.clone(), timeout)
                    .with_model(model)
                    .with_persona(persona),
            )
        }
    }
}

/// Model used when none is configured.
pub fn ollama_default_model() -> &'static str {
    ollama::DEFAULT_MODEL
}

/// Split a reply into utterances: one per paragraph (blank-line separated). Fenced code
/// blocks stay whole even when they contain blank lines.
pub fn split_utterances(text: &str) -> Vec<Utterance> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut in_fence = false;

    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            current.push(line);
            continue;
        }
        if !in_fence && line.trim().is_empty() {
            flush(&mut current, &mut out);
            continue;
        }
        current.push(line);
    }
    flush(&mut current, &mut out);
    out
}

fn flush(lines: &mut Vec<&str>, out: &mut Vec<Utterance>) {
    if lines.is_empty() {
        return;
    }
    let block = lines.join("\n");
    lines.clear();
    let block = block.trim();
    if !block.is_empty() {
        out.push(Utterance::new(block));
    }
}
