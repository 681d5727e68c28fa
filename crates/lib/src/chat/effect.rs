//! Effects and notices produced by session transitions.
//!
//! Transitions never perform I/O. They return [`Effect`]s, which the runtime executes.

use crate::chat::message::{Message, MessageId};
use serde::Serialize;
use std::fmt;

/// Session generation marker. Bumped on every new chat; results tagged with an older
/// generation are stale and get discarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Generation(pub u64);

impl Generation {
    pub(crate) fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen {}", self.0)
    }
}

/// Work the runtime has to carry out after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Ask the AI-response collaborator for a reply to `text`.
    RequestReply {
        generation: Generation,
        text: String,
        /// Transcript before the user message that started this cycle.
        context: Vec<Message>,
    },
    /// Hand `message` (the new gate occupant) to the playback collaborator.
    Present {
        generation: Generation,
        message: Message,
    },
    /// Stop whatever presentation is running; its completion will be ignored.
    CancelPlayback,
    /// Tell the presentation adapter something happened.
    Notify(Notice),
}

/// Discrete notifications for the presentation adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Notice {
    /// A message was added to the transcript (re-render, scroll to bottom).
    MessageAppended { message: Message },
    LoadingChanged { loading: bool },
    PlaybackFinished { id: MessageId },
    HistoryCleared,
    SessionReset { generation: Generation },
    /// The AI-response collaborator failed; the user may resend.
    RequestFailed { error: String },
    ZoomChanged { zoomed: bool },
}
