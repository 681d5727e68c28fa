//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.chalk/config.json`) and environment.
//! Every field has a default, so a missing file or an empty object is a valid config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::llm::ollama_default_model;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Where replies come from.
    #[serde(default)]
    pub backend: BackendConfig,

    /// How assistant messages are presented.
    #[serde(default)]
    pub playback: PlaybackConfig,

    /// Front-end preferences.
    #[serde(default)]
    pub ui: UiConfig,

    /// Tutor persona location.
    #[serde(default)]
    pub tutor: TutorConfig,
}

/// Which AI-response collaborator to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Tutor server speaking the `/chat` protocol.
    #[default]
    Server,
    /// Local Ollama instance; replies are split into utterances by paragraph.
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,

    /// Tutor server base URL (default "http://127.0.0.1:3000"). Overridden by CHALK_SERVER_URL env.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Ollama base URL (default "http://127.0.0.1:11434").
    #[serde(default)]
    pub ollama_url: Option<String>,

    /// Ollama model: use the exact name from `ollama list`. Overridden by CHALK_MODEL env.
    #[serde(default)]
    pub model: Option<String>,

    /// Per-request timeout in seconds (default 60).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_server_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            server_url: default_server_url(),
            ollama_url: None,
            model: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Presentation settings for the playback collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackConfig {
    /// Pace of the terminal presenter (default 180; 0 prints instantly).
    #[serde(default = "default_words_per_minute")]
    pub words_per_minute: u32,

    /// Seconds after which a presentation that never finishes releases the gate anyway
    /// (default 120; 0 waits forever).
    #[serde(default = "default_playback_timeout_secs")]
    pub timeout_secs: u64,

    /// When set, speak through this program instead of printing (text is the last argument).
    #[serde(default)]
    pub command: Option<SpeechCommand>,
}

/// External speech program, e.g. `{ "program": "espeak", "args": ["-s", "160"] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_words_per_minute() -> u32 {
    180
}

fn default_playback_timeout_secs() -> u64 {
    120
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            words_per_minute: default_words_per_minute(),
            timeout_secs: default_playback_timeout_secs(),
            command: None,
        }
    }
}

impl PlaybackConfig {
    /// None when the timeout is disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Front-end preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiConfig {
    /// Initial camera zoom (default true).
    #[serde(default = "default_camera_zoomed")]
    pub camera_zoomed: bool,

    /// Canned questions offered when the chat is empty.
    #[serde(default = "default_quick_actions")]
    pub quick_actions: Vec<QuickAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickAction {
    pub label: String,
    pub question: String,
}

fn default_camera_zoomed() -> bool {
    true
}

fn default_quick_actions() -> Vec<QuickAction> {
    [
        ("Python factorial code", "Python code to write factorial function"),
        ("Data structure nodes", "What is a node in data structure?"),
        ("C++ classes & objects", "What are classes and objects in C++?"),
    ]
    .into_iter()
    .map(|(label, question)| QuickAction {
        label: label.to_string(),
        question: question.to_string(),
    })
    .collect()
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            camera_zoomed: default_camera_zoomed(),
            quick_actions: default_quick_actions(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorConfig {
    /// Workspace holding TUTOR.md (default ~/.chalk/workspace).
    pub workspace: Option<PathBuf>,
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Resolve the tutor server URL: env CHALK_SERVER_URL overrides config.
pub fn resolve_server_url(backend: &BackendConfig) -> String {
    non_empty_env("CHALK_SERVER_URL").unwrap_or_else(|| backend.server_url.trim().to_string())
}

/// Resolve the Ollama model: env CHALK_MODEL overrides config; falls back to the default model.
pub fn resolve_model(backend: &BackendConfig) -> String {
    non_empty_env("CHALK_MODEL")
        .or_else(|| {
            backend
                .model
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| ollama_default_model().to_string())
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("CHALK_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".chalk").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Resolve the workspace directory holding the tutor persona.
/// Relative paths are resolved against the config file's parent.
pub fn resolve_workspace_dir(config: &Config, config_path: &Path) -> PathBuf {
    let config_parent = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    match &config.tutor.workspace {
        Some(d) if !d.as_os_str().is_empty() => {
            if d.is_absolute() {
                d.clone()
            } else {
                config_parent.join(d)
            }
        }
        _ => config_parent.join("workspace"),
    }
}

/// Load config from the given path (or the default path). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
