//! Chat message types shared by the history store, the playback gate and the runtime.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Who wrote a message. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }
}

/// Identifier of a message within one process. Never reused, not even after a new chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One entry of the chat transcript.
///
/// `sender` and `text` are private so they cannot change after creation; `played`
/// only ever flips from false to true, through [`Message::mark_played`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    sender: Sender,
    text: String,
    played: bool,
}

impl Message {
    /// User messages carry no playback and count as already complete.
    pub fn user(id: MessageId, text: impl Into<String>) -> Self {
        Self {
            id,
            sender: Sender::User,
            text: text.into(),
            played: true,
        }
    }

    /// Assistant messages start unplayed; the playback gate marks them once presented.
    pub fn assistant(id: MessageId, text: impl Into<String>) -> Self {
        Self {
            id,
            sender: Sender::Assistant,
            text: text.into(),
            played: false,
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn played(&self) -> bool {
        self.played
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }

    pub(crate) fn mark_played(&mut self) {
        self.played = true;
    }
}

/// One discrete unit of assistant reply text, presented as a single block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
}

impl Utterance {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Blank utterances carry nothing to present.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Hands out message ids in increasing order.
#[derive(Debug, Default)]
pub(crate) struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub(crate) fn next(&mut self) -> MessageId {
        self.next += 1;
        MessageId(self.next)
    }
}
