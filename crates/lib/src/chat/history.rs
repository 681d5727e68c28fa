//! Ordered chat transcript. Append-only, except for an explicit clear.

use crate::chat::message::{Message, MessageId};

/// Chronological list of messages; insertion order is render order.
#[derive(Debug, Clone, Default)]
pub struct History {
    messages: Vec<Message>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message at the end.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Remove every message. Returns false (and changes nothing) when already empty.
    pub fn clear(&mut self) -> bool {
        if self.messages.is_empty() {
            return false;
        }
        self.messages.clear();
        true
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Flag the message with `id` as presented. Returns false if it is no longer in the
    /// transcript (e.g. the history was cleared while it was playing).
    pub fn mark_played(&mut self, id: MessageId) -> bool {
        match self.messages.iter_mut().rev().find(|m| m.id() == id) {
            Some(m) => {
                m.mark_played();
                true
            }
            None => false,
        }
    }

    pub fn to_vec(&self) -> Vec<Message> {
        self.messages.clone()
    }
}
