//! Single-slot playback gate: holds the assistant message currently being presented.

use crate::chat::message::{Message, MessageId};

/// What the gate currently holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Playback {
    #[default]
    Empty,
    Occupied(Message),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GateError {
    #[error("playback gate already occupied by message {0}")]
    Occupied(MessageId),
}

/// Serializes presentation of assistant replies. While occupied, new sends are refused.
#[derive(Debug, Clone, Default)]
pub struct PlaybackGate {
    current: Playback,
}

impl PlaybackGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `message` in the slot. Fails without touching the occupant when the slot is taken.
    pub fn occupy(&mut self, message: Message) -> Result<(), GateError> {
        match &self.current {
            Playback::Occupied(m) => Err(GateError::Occupied(m.id())),
            Playback::Empty => {
                self.current = Playback::Occupied(message);
                Ok(())
            }
        }
    }

    /// Presentation finished: mark the occupant played and empty the slot.
    pub fn release(&mut self) -> Option<Message> {
        match std::mem::take(&mut self.current) {
            Playback::Occupied(mut m) => {
                m.mark_played();
                Some(m)
            }
            Playback::Empty => None,
        }
    }

    /// Drop the occupant without completing it (abrupt reset).
    pub fn reset(&mut self) -> Option<Message> {
        match std::mem::take(&mut self.current) {
            Playback::Occupied(m) => Some(m),
            Playback::Empty => None,
        }
    }

    pub fn is_blocking(&self) -> bool {
        match self.current {
            Playback::Occupied(_) => true,
            Playback::Empty => false,
        }
    }

    pub fn current(&self) -> Option<&Message> {
        match &self.current {
            Playback::Occupied(m) => Some(m),
            Playback::Empty => None,
        }
    }

    pub fn is_occupied_by(&self, id: MessageId) -> bool {
        matches!(&self.current, Playback::Occupied(m) if m.id() == id)
    }
}
