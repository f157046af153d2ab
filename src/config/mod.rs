//! Configuration management.
//!
//! This module resolves where epicsync keeps its data and loads the layered
//! [`Settings`] used by the remote adapter, the reconciliation engine, the
//! narrative collaborator and the HTTP server.
//!
//! # Layout
//!
//! - **Config file**: `~/.epicsync/config.json` (optional)
//! - **Database**: `~/.epicsync/data/epicsync.db` unless overridden
//!
//! Every setting resolves as CLI flag > environment variable > config file >
//! built-in default.

mod settings;

pub use settings::{
    ConfigFile, NarrativeSettings, RemoteSettings, ServerSettings, Settings, SyncSettings,
    MAX_BATCH_SIZE,
};

use crate::error::{Error, Result};

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Default server bind address.
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Get the global epicsync directory location (`~/.epicsync/`).
#[must_use]
pub fn global_epicsync_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".epicsync"))
}

/// Path of the optional JSON config file.
///
/// # Errors
///
/// Returns `Error::Config` if the home directory cannot be determined.
pub fn config_path() -> Result<PathBuf> {
    global_epicsync_dir()
        .map(|dir| dir.join("config.json"))
        .ok_or_else(|| Error::Config("Could not determine home directory".into()))
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `EPICSYNC_DB` environment variable
/// 3. Global location: `~/.epicsync/data/epicsync.db`
///
/// # Returns
///
/// Returns the path to the database file, or `None` if no location found.
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Ok(db_path) = std::env::var("EPICSYNC_DB") {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    global_epicsync_dir().map(|dir| dir.join("data").join("epicsync.db"))
}

/// Resolve the server bind address.
///
/// Priority: `--bind` flag, `EPICSYNC_BIND`, config file, then
/// [`DEFAULT_BIND`].
///
/// # Errors
///
/// Returns `Error::Config` if the chosen value is not a socket address.
pub fn resolve_bind_addr(explicit: Option<&str>, settings: &Settings) -> Result<SocketAddr> {
    let raw = explicit
        .map(str::to_string)
        .or_else(|| std::env::var("EPICSYNC_BIND").ok().filter(|v| !v.trim().is_empty()))
        .or_else(|| settings.server.bind.clone())
        .unwrap_or_else(|| DEFAULT_BIND.to_string());

    raw.trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid bind address '{raw}': {e}")))
}

/// Load the config file, returning defaults when it does not exist.
///
/// # Errors
///
/// Returns `Error::Config` if the file exists but cannot be read or parsed.
pub fn load_config_file() -> Result<ConfigFile> {
    let path = config_path()?;
    load_config_file_from(&path)
}

/// Load a config file from an explicit path.
///
/// # Errors
///
/// Returns `Error::Config` if the file exists but cannot be read or parsed.
pub fn load_config_file_from(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))
}

/// Load settings from the config file and the process environment.
///
/// # Errors
///
/// Returns `Error::Config` for unreadable files or malformed values.
pub fn load_settings() -> Result<Settings> {
    let file = load_config_file()?;
    Settings::from_sources(file, |key| std::env::var(key).ok())
}
