//! Request coordination: the send-gating predicate, reply handling, and in-order
//! presentation of multi-utterance replies through the playback gate.
//!
//! One cycle runs `Idle -> Sending -> (Presenting -> Released)* -> Idle`, or
//! `Sending -> Failed -> Idle`. The next utterance of a reply is appended and handed to
//! the gate only after the previous one has been released.

use crate::chat::effect::{Effect, Generation, Notice};
use crate::chat::message::{Message, MessageId, Utterance};
use crate::chat::reply::ReplyError;
use crate::chat::session::Session;

/// Why a send was dropped. Rejections are not errors; the caller just ignores the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Text was empty or whitespace only.
    EmptyText,
    /// A request is already outstanding.
    Loading,
    /// An assistant reply is still being presented (or queued for presentation).
    Presenting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Accepted(Vec<Effect>),
    Rejected(Rejection),
}

impl Session {
    /// True when a new send would be accepted (text aside). Adapters disable their send
    /// affordance whenever this is false.
    pub fn can_send(&self) -> bool {
        self.busy_reason().is_none()
    }

    fn busy_reason(&self) -> Option<Rejection> {
        if self.loading {
            Some(Rejection::Loading)
        } else if self.gate.is_blocking() || !self.pending.is_empty() {
            Some(Rejection::Presenting)
        } else {
            None
        }
    }

    /// Start a cycle for `text`: append the user message right away and request a reply.
    pub fn send(&mut self, text: &str) -> SendOutcome {
        let text = text.trim();
        if let Some(reason) = self.busy_reason() {
            log::debug!("send rejected: {:?}", reason);
            return SendOutcome::Rejected(reason);
        }
        if text.is_empty() {
            return SendOutcome::Rejected(Rejection::EmptyText);
        }

        let context = self.history.to_vec();
        let message = Message::user(self.ids.next(), text);
        self.history.append(message.clone());
        self.last_error = None;
        self.loading = true;
        log::debug!("send accepted: {} ({})", message.id(), self.generation);

        SendOutcome::Accepted(vec![
            Effect::Notify(Notice::MessageAppended { message }),
            Effect::Notify(Notice::LoadingChanged { loading: true }),
            Effect::RequestReply {
                generation: self.generation,
                text: text.to_string(),
                context,
            },
        ])
    }

    /// The AI-response collaborator answered (or failed) for the cycle started in `generation`.
    pub fn on_reply(
        &mut self,
        generation: Generation,
        result: Result<Vec<Utterance>, ReplyError>,
    ) -> Vec<Effect> {
        if generation != self.generation || !self.loading {
            log::debug!(
                "discarding stale reply ({}, current {})",
                generation,
                self.generation
            );
            return Vec::new();
        }
        self.loading = false;
        let mut effects = vec![Effect::Notify(Notice::LoadingChanged { loading: false })];

        match result {
            Ok(utterances) => {
                let total = utterances.len();
                self.pending
                    .extend(utterances.into_iter().filter(|u| !u.is_blank()));
                if self.pending.is_empty() {
                    log::warn!("reply had no presentable utterances ({} received)", total);
                }
                self.advance(&mut effects);
            }
            Err(e) => {
                log::warn!("reply request failed: {}", e);
                let error = e.to_string();
                self.last_error = Some(error.clone());
                effects.push(Effect::Notify(Notice::RequestFailed { error }));
            }
        }
        effects
    }

    /// The playback collaborator finished presenting `id`.
    pub fn on_playback_finished(&mut self, generation: Generation, id: MessageId) -> Vec<Effect> {
        if generation != self.generation || !self.gate.is_occupied_by(id) {
            log::debug!("ignoring playback completion for {} ({})", id, generation);
            return Vec::new();
        }
        let mut effects = Vec::new();
        if let Some(done) = self.gate.release() {
            if !self.history.mark_played(done.id()) {
                log::debug!("{} finished after leaving the history", done.id());
            }
            effects.push(Effect::Notify(Notice::PlaybackFinished { id: done.id() }));
        }
        self.advance(&mut effects);
        effects
    }

    /// Move the next queued utterance into the history and the gate, if the gate is free.
    fn advance(&mut self, effects: &mut Vec<Effect>) {
        if self.gate.is_blocking() {
            return;
        }
        let Some(utterance) = self.pending.pop_front() else {
            return;
        };
        let message = Message::assistant(self.ids.next(), utterance.text);
        if let Err(e) = self.gate.occupy(message.clone()) {
            log::error!("cannot present {}: {}", message.id(), e);
            return;
        }
        self.history.append(message.clone());
        effects.push(Effect::Notify(Notice::MessageAppended {
            message: message.clone(),
        }));
        effects.push(Effect::Present {
            generation: self.generation,
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::Sender;

    fn start(s: &mut Session, text: &str) -> Vec<Effect> {
        match s.send(text) {
            SendOutcome::Accepted(effects) => effects,
            SendOutcome::Rejected(r) => panic!("send rejected: {:?}", r),
        }
    }

    fn presented(effects: &[Effect]) -> Vec<Message> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Present { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn hello_cycle_appends_and_occupies_gate() {
        let mut s = Session::default();
        let effects = start(&mut s, "Hello");
        assert_eq!(s.history().len(), 1);
        assert_eq!(s.history().last().unwrap().text(), "Hello");
        assert!(s.loading());
        assert!(matches!(
            effects.last(),
            Some(Effect::RequestReply { text, context, .. }) if text == "Hello" && context.is_empty()
        ));

        let g = s.generation();
        let effects = s.on_reply(g, Ok(vec![Utterance::new("Hi there!")]));
        assert!(!s.loading());
        let msgs: Vec<_> = s.history().iter().cloned().collect();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[1].sender(), Sender::Assistant);
        assert_eq!(msgs[1].text(), "Hi there!");
        assert!(!msgs[1].played());
        assert_eq!(s.current_playback().unwrap().text(), "Hi there!");
        assert_eq!(presented(&effects).len(), 1);
    }

    #[test]
    fn sends_are_rejected_while_busy() {
        let mut s = Session::default();
        start(&mut s, "first");
        assert_eq!(s.send("second"), SendOutcome::Rejected(Rejection::Loading));
        assert_eq!(s.history().len(), 1);

        let g = s.generation();
        s.on_reply(g, Ok(vec![Utterance::new("answer")]));
        assert_eq!(s.send("ignored"), SendOutcome::Rejected(Rejection::Presenting));
        assert_eq!(s.history().len(), 2);
    }

    #[test]
    fn blank_text_is_rejected() {
        let mut s = Session::default();
        assert_eq!(s.send("   \n"), SendOutcome::Rejected(Rejection::EmptyText));
        assert!(s.history().is_empty());
        assert!(!s.loading());
    }

    #[test]
    fn release_marks_played_and_reopens_sends() {
        let mut s = Session::default();
        start(&mut s, "q");
        let g = s.generation();
        let effects = s.on_reply(g, Ok(vec![Utterance::new("a")]));
        let m = presented(&effects).remove(0);

        let effects = s.on_playback_finished(g, m.id());
        assert_eq!(
            effects,
            vec![Effect::Notify(Notice::PlaybackFinished { id: m.id() })]
        );
        assert!(s.history().last().unwrap().played());
        assert!(s.current_playback().is_none());
        assert!(s.can_send());
    }

    #[test]
    fn utterances_are_presented_one_at_a_time_in_order() {
        let mut s = Session::default();
        start(&mut s, "q");
        let g = s.generation();
        let mut effects = s.on_reply(
            g,
            Ok(vec![
                Utterance::new("one"),
                Utterance::new("two"),
                Utterance::new("three"),
            ]),
        );

        let mut order = Vec::new();
        loop {
            let mut batch = presented(&effects);
            if batch.is_empty() {
                break;
            }
            assert_eq!(batch.len(), 1);
            let m = batch.remove(0);
            // Only the occupant is in the history so far; the next one is still queued.
            assert_eq!(s.history().last().unwrap().id(), m.id());
            assert!(!s.can_send());
            order.push(m.text().to_string());
            effects = s.on_playback_finished(g, m.id());
        }
        assert_eq!(order, vec!["one", "two", "three"]);
        assert!(s.history().iter().all(|m| m.played()));
        assert!(s.can_send());
    }

    #[test]
    fn failure_keeps_the_question_and_reports() {
        let mut s = Session::default();
        start(&mut s, "why?");
        let g = s.generation();
        let effects = s.on_reply(g, Err(ReplyError::Network("connection refused".into())));
        assert!(!s.loading());
        assert_eq!(s.history().len(), 1);
        assert_eq!(s.history().last().unwrap().text(), "why?");
        assert!(s.last_error().is_some());
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::Notify(Notice::RequestFailed { .. }))));
        assert!(s.can_send());

        start(&mut s, "retry");
        assert!(s.last_error().is_none());
    }

    #[test]
    fn stale_reply_after_new_chat_is_ignored() {
        let mut s = Session::default();
        start(&mut s, "Hello");
        let old = s.generation();
        s.start_new_chat();

        assert!(s.on_reply(old, Ok(vec![Utterance::new("late")])).is_empty());
        assert!(s.history().is_empty());
        assert!(!s.loading());
        assert!(s.current_playback().is_none());
    }

    #[test]
    fn stale_playback_completion_is_ignored() {
        let mut s = Session::default();
        start(&mut s, "q");
        let old = s.generation();
        let effects = s.on_reply(old, Ok(vec![Utterance::new("a")]));
        let m = presented(&effects).remove(0);
        s.start_new_chat();

        start(&mut s, "again");
        let g = s.generation();
        let effects = s.on_reply(g, Ok(vec![Utterance::new("b")]));
        let current = presented(&effects).remove(0);

        assert!(s.on_playback_finished(old, m.id()).is_empty());
        assert!(s.on_playback_finished(g, m.id()).is_empty());
        assert_eq!(s.current_playback().unwrap().id(), current.id());
    }

    #[test]
    fn blank_utterances_are_skipped_and_empty_reply_ends_cycle() {
        let mut s = Session::default();
        start(&mut s, "q");
        let g = s.generation();
        let effects = s.on_reply(g, Ok(vec![Utterance::new("  "), Utterance::new("")]));
        assert!(presented(&effects).is_empty());
        assert_eq!(s.history().len(), 1);
        assert!(s.can_send());
    }

    #[test]
    fn context_holds_prior_transcript_only() {
        let mut s = Session::default();
        start(&mut s, "first");
        let g = s.generation();
        let effects = s.on_reply(g, Ok(vec![Utterance::new("answer")]));
        let m = presented(&effects).remove(0);
        s.on_playback_finished(g, m.id());

        let effects = start(&mut s, "second");
        let Some(Effect::RequestReply { context, .. }) = effects.last() else {
            panic!("expected a reply request");
        };
        let texts: Vec<&str> = context.iter().map(|m| m.text()).collect();
        assert_eq!(texts, vec!["first", "answer"]);
    }
}
