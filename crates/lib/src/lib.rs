//! Chalk core library: chat orchestration, reply backends, playback and configuration
//! used by the CLI.

pub mod chat;
pub mod config;
pub mod init;
pub mod llm;
pub mod persona;
pub mod playback;
pub mod runtime;

pub use runtime::{ChatHandle, ChatRuntime, RuntimeError, Snapshot};
