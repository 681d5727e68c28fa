//! Ollama API client (http://127.0.0.1:11434 by default).
//! Non-streaming chat; the reply is split into utterances for presentation.

use crate::chat::{Message, Sender, Utterance};
use crate::llm::{split_utterances, ReplyError, ReplySource};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";
pub(crate) const DEFAULT_MODEL: &str = "llama3.2:latest";

/// Client for Ollama HTTP API.
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
    model: String,
    persona: Option<String>,
}

impl OllamaClient {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("ollama: falling back to default http client: {}", e);
                reqwest::Client::new()
            });
        Self {
            base_url,
            client,
            model: DEFAULT_MODEL.to_string(),
            persona: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Tutor persona used as the system message (today's date is appended).
    pub fn with_persona(mut self, persona: Option<String>) -> Self {
        self.persona = persona.filter(|p| !p.trim().is_empty());
        self
    }

    /// GET /api/tags: list available models.
    pub async fn list_models(&self) -> Result<Vec<OllamaModel>, ReplyError> {
        let url = format!("{}/api/tags", self.base_url);
        let res = self.client.get(&url).send().await?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(ReplyError::Server { status, body });
        }
        let data: TagsResponse = res.json().await?;
        Ok(data.models.unwrap_or_default())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// POST /api/chat: non-streaming chat completion with the client's model.
    pub async fn chat(&self, messages: Vec<ChatMessage>) -> Result<ChatResponse, ReplyError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model: self.model.clone(),
            messages,
            stream: false,
        };
        let res = self.client.post(&url).json(&body).send().await?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(ReplyError::Server { status, body });
        }
        let data: ChatResponse = res.json().await?;
        Ok(data)
    }

    /// System message (if any), prior transcript, then the new user message.
    fn build_messages(&self, text: &str, context: &[Message]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(context.len() + 2);
        if let Some(persona) = &self.persona {
            let date = chrono::Local::now().format("%Y-%m-%d");
            messages.push(ChatMessage::new(
                "system",
                format!("{}\n\nToday's date: {}", persona.trim(), date),
            ));
        }
        messages.extend(context.iter().map(|m| {
            let role = match m.sender() {
                Sender::User => "user",
                Sender::Assistant => "assistant",
            };
            ChatMessage::new(role, m.text())
        }));
        messages.push(ChatMessage::new("user", text));
        messages
    }
}

#[async_trait]
impl ReplySource for OllamaClient {
    async fn request_reply(
        &self,
        text: &str,
        context: &[Message],
    ) -> Result<Vec<Utterance>, ReplyError> {
        let messages = self.build_messages(text, context);
        log::debug!("ollama: chat with {} messages on {}", messages.len(), self.model);
        let res = self.chat(messages).await?;
        Ok(split_utterances(res.content()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaModel {
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Option<Vec<OllamaModel>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub message: Option<ChatMessage>,
    #[serde(default)]
    pub done: bool,
}

impl ChatResponse {
    /// Text content of the assistant message, if any.
    pub fn content(&self) -> &str {
        self.message
            .as_ref()
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}
