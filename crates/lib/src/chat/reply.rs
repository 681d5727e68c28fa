//! Reply failures as the chat core sees them. Backends convert their own errors into these.

/// Failure of a reply request. Never fatal: the coordinator turns it into a notice.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ReplyError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },
    #[error("unreadable reply: {0}")]
    Decode(String),
}
