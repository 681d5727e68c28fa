//! Chat session state and the session lifecycle operations (new chat, clear, zoom).
//!
//! A [`Session`] is the single mutable resource of the chat core. It is only changed
//! through the operations here and in the coordinator, each of which runs to
//! completion and reports the [`Effect`]s it produced.

use crate::chat::effect::{Effect, Generation, Notice};
use crate::chat::gate::PlaybackGate;
use crate::chat::history::History;
use crate::chat::message::{IdAllocator, Message, Utterance};
use std::collections::VecDeque;

#[derive(Debug)]
pub struct Session {
    pub(crate) history: History,
    pub(crate) gate: PlaybackGate,
    pub(crate) loading: bool,
    /// Utterances received but not yet appended; each waits for the gate to free up.
    pub(crate) pending: VecDeque<Utterance>,
    pub(crate) camera_zoomed: bool,
    pub(crate) generation: Generation,
    pub(crate) last_error: Option<String>,
    pub(crate) ids: IdAllocator,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Session {
    /// Fresh session: empty transcript, not loading, nothing presenting.
    pub fn new(camera_zoomed: bool) -> Self {
        Self {
            history: History::new(),
            gate: PlaybackGate::new(),
            loading: false,
            pending: VecDeque::new(),
            camera_zoomed,
            generation: Generation::default(),
            last_error: None,
            ids: IdAllocator::default(),
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    /// The gate occupant, i.e. the assistant message being presented right now.
    pub fn current_playback(&self) -> Option<&Message> {
        self.gate.current()
    }

    pub fn camera_zoomed(&self) -> bool {
        self.camera_zoomed
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn pending_utterances(&self) -> usize {
        self.pending.len()
    }

    /// Full reset: empty transcript, abandon any presentation and outstanding request.
    /// Late results from before the reset are discarded by generation. Zoom is kept.
    pub fn start_new_chat(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.generation = self.generation.next();
        self.history.clear();
        self.pending.clear();
        self.last_error = None;
        if let Some(dropped) = self.gate.reset() {
            log::debug!("new chat: abandoning presentation of {}", dropped.id());
            effects.push(Effect::CancelPlayback);
        }
        if self.loading {
            log::debug!("new chat: discarding outstanding request");
            self.loading = false;
            effects.push(Effect::Notify(Notice::LoadingChanged { loading: false }));
        }
        log::info!("started new chat ({})", self.generation);
        effects.push(Effect::Notify(Notice::SessionReset {
            generation: self.generation,
        }));
        effects
    }

    /// Erase the transcript only. Loading state, the gate and queued utterances stay as
    /// they are. No-op when there is nothing to clear.
    pub fn clear_chat_history(&mut self) -> Vec<Effect> {
        if !self.history.clear() {
            return Vec::new();
        }
        log::info!("chat history cleared");
        vec![Effect::Notify(Notice::HistoryCleared)]
    }

    pub fn toggle_zoom(&mut self) -> Vec<Effect> {
        self.set_camera_zoomed(!self.camera_zoomed)
    }

    pub fn set_camera_zoomed(&mut self, zoomed: bool) -> Vec<Effect> {
        if self.camera_zoomed == zoomed {
            return Vec::new();
        }
        self.camera_zoomed = zoomed;
        vec![Effect::Notify(Notice::ZoomChanged { zoomed })]
    }
}
