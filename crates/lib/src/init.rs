//! Initialize the configuration directory: create ~/.chalk, a default config and the workspace.
//!
//! Layout mirrors `crates/lib/config/`: `config/workspace/TUTOR.md` → `~/.chalk/workspace/TUTOR.md`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::persona::PERSONA_FILE;

static DEFAULT_PERSONA: &str = include_str!("../config/workspace/TUTOR.md");

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` with `{}` if missing.
/// - Creates the `workspace` subdirectory and seeds `TUTOR.md` if missing.
///
/// Existing files are never overwritten. Returns the config directory.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, b"{}")
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    let workspace = config_dir.join("workspace");
    if !workspace.exists() {
        std::fs::create_dir_all(&workspace)
            .with_context(|| format!("creating workspace directory {}", workspace.display()))?;
        log::info!("created workspace directory at {}", workspace.display());
    }
    let persona = workspace.join(PERSONA_FILE);
    if !persona.exists() {
        std::fs::write(&persona, DEFAULT_PERSONA)
            .with_context(|| format!("writing default {} to {}", PERSONA_FILE, persona.display()))?;
        log::info!("wrote default {} to {}", PERSONA_FILE, persona.display());
    } else {
        log::debug!("{} already exists at {}, skipping", PERSONA_FILE, persona.display());
    }

    Ok(config_dir.to_path_buf())
}
