//! Chat orchestration core: transcript, playback gate, request coordination and
//! session lifecycle. Pure state transitions; the runtime performs the effects.

mod coordinator;
mod effect;
mod gate;
mod history;
mod message;
mod reply;
mod session;

pub use coordinator::{Rejection, SendOutcome};
pub use effect::{Effect, Generation, Notice};
pub use gate::{GateError, Playback, PlaybackGate};
pub use history::History;
pub use message::{Message, MessageId, Sender, Utterance};
pub use reply::ReplyError;
pub use session::Session;
