//! Tutor server client: `POST {base}/chat` with `{"message": ...}`, answered by
//! `{"messages": [{"text": ...}, ...]}`. Each entry is one utterance; avatar cue
//! fields (audio, lipsync, expression, animation) are ignored here.

use crate::chat::{Message, Utterance};
use crate::llm::{ReplyError, ReplySource};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";

#[derive(Clone)]
pub struct TutorServerClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

/// Reply body of the tutor server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerReply {
    #[serde(default)]
    pub messages: Vec<ServerUtterance>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerUtterance {
    #[serde(default)]
    pub text: String,
}

impl TutorServerClient {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("tutor server: falling back to default http client: {}", e);
                reqwest::Client::new()
            });
        Self { base_url, client }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ReplySource for TutorServerClient {
    async fn request_reply(
        &self,
        text: &str,
        _context: &[Message],
    ) -> Result<Vec<Utterance>, ReplyError> {
        let url = format!("{}/chat", self.base_url);
        let res = self
            .client
            .post(&url)
            .json(&ChatRequest { message: text })
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(ReplyError::Server { status, body });
        }
        let reply: ServerReply = res.json().await?;
        log::debug!("tutor server: {} utterances", reply.messages.len());
        Ok(reply
            .messages
            .into_iter()
            .map(|m| Utterance::new(m.text))
            .collect())
    }
}
