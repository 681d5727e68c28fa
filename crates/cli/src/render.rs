//! Terminal text for the chat session.

use lib::chat::{Message, Notice};
use lib::config::QuickAction;

/// Where a line of output goes.
#[derive(Debug, PartialEq, Eq)]
pub enum Output {
    Stdout(String),
    Stderr(String),
}

/// Shown whenever the transcript is empty: at start, after /new and after /clear.
pub fn welcome(quick_actions: &[QuickAction]) -> String {
    let mut out = String::from("Welcome! Ask your tutor anything.\n");
    if !quick_actions.is_empty() {
        out.push_str("Quick questions (type /quick N):\n");
        for (i, action) in quick_actions.iter().enumerate() {
            out.push_str(&format!("  {}. {}\n", i + 1, action.label));
        }
    }
    out.push_str("Type /help for commands.");
    out
}

pub fn help() -> &'static str {
    "  /new        start a new chat
  /clear      clear the chat history
  /zoom       toggle the camera zoom
  /history    show the transcript
  /quick N    ask quick question N
  /help       show this help
  /exit       quit"
}

pub fn history(messages: &[Message]) -> String {
    if messages.is_empty() {
        return "(no messages yet)".to_string();
    }
    messages
        .iter()
        .map(|m| {
            if m.is_user() {
                format!("you:   {}", m.text())
            } else if m.played() {
                format!("tutor: {}  [spoken]", m.text())
            } else {
                format!("tutor: {}", m.text())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text for a notice, if the terminal shows it. Assistant messages are echoed only when
/// the presenter does not print them itself.
pub fn notice(notice: &Notice, echo_assistant: bool, quick_actions: &[QuickAction]) -> Option<Output> {
    match notice {
        Notice::MessageAppended { message } if !message.is_user() && echo_assistant => {
            Some(Output::Stdout(format!("< {}", message.text())))
        }
        Notice::LoadingChanged { loading: true } => {
            Some(Output::Stdout("Your tutor is thinking...".to_string()))
        }
        Notice::RequestFailed { error } => Some(Output::Stderr(format!(
            "The tutor could not answer ({}). You can send your question again.",
            error
        ))),
        Notice::HistoryCleared => Some(Output::Stdout(format!(
            "Chat history cleared.\n{}",
            welcome(quick_actions)
        ))),
        Notice::SessionReset { .. } => Some(Output::Stdout(format!(
            "Started a new chat.\n{}",
            welcome(quick_actions)
        ))),
        Notice::ZoomChanged { zoomed } => Some(Output::Stdout(format!(
            "Camera {}.",
            if *zoomed { "zoomed in" } else { "zoomed out" }
        ))),
        _ => None,
    }
}
