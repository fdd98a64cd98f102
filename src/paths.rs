//! Path resolution for cpsync
//!
//! # Environment Variables
//!
//! - `CPSYNC_STATE_DIR` - Override the state directory
//! - `CPSYNC_MANIFEST` - Default manifest path (read by the CLI)
//!
//! # State File Resolution
//!
//! 1. `--state <path>`
//! 2. `CPSYNC_STATE_DIR/state.toml`
//! 3. `XDG_STATE_HOME/cpsync/state.toml` (if set)
//! 4. Platform default:
//!    - Windows: `%LOCALAPPDATA%\cpsync\state.toml`
//!    - macOS/Linux: `~/.local/state/cpsync/state.toml`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "CPSYNC_STATE_DIR";

/// File name of the state file inside the state directory
pub const STATE_FILE: &str = "state.toml";

/// Manifest looked up in the working directory when none is given
pub const DEFAULT_MANIFEST: &str = "cpsync.toml";

/// Get the cpsync state directory path
pub fn state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join("cpsync");
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(local_app_data) = dirs::data_local_dir() {
            let path = local_app_data.join("cpsync");
            log::debug!("Using Windows state dir: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".local").join("state").join("cpsync");
    log::debug!("Using default state dir: {}", path.display());
    Ok(path)
}

/// Resolve the state file, honoring an explicit `--state` path
pub fn state_file(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(expand(&path.to_string_lossy())),
        None => Ok(state_dir()?.join(STATE_FILE)),
    }
}

/// Resolve the manifest path, defaulting to `cpsync.toml`
pub fn manifest_file(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => expand(&path.to_string_lossy()),
        None => PathBuf::from(DEFAULT_MANIFEST),
    }
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables are left as written.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
