//! Tutor persona: TUTOR.md in the workspace, used as the system prompt where the backend takes one.

use std::fs;
use std::path::Path;

/// File name of the persona inside the workspace.
pub const PERSONA_FILE: &str = "TUTOR.md";

/// Load the persona from the workspace.
///
/// Returns the file contents when TUTOR.md exists and is non-empty; otherwise None.
pub fn load_persona(workspace_dir: Option<&Path>) -> Option<String> {
    let dir = workspace_dir?;
    let path = dir.join(PERSONA_FILE);
    match fs::read_to_string(&path) {
        Ok(s) if !s.trim().is_empty() => {
            log::debug!("loaded persona from {}", path.display());
            Some(s)
        }
        _ => None,
    }
}
