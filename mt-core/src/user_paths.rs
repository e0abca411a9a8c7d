//! User directory lookups for the multitool.

use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_DIR: &str = "multitool";

/// Get the user's configuration directory for the multitool.
///
/// Returns:
/// - Linux: `~/.config/multitool` or `$XDG_CONFIG_HOME/multitool`
/// - macOS: `~/Library/Application Support/multitool`
/// - Windows: `%APPDATA%\multitool`
#[must_use = "configuration directory path should be used"]
pub fn user_config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .context("Could not determine user config directory")?
        .join(APP_DIR))
}

/// Get the user's cache directory for the multitool.
///
/// Returns:
/// - Linux: `~/.cache/multitool` or `$XDG_CACHE_HOME/multitool`
/// - macOS: `~/Library/Caches/multitool`
/// - Windows: `%LOCALAPPDATA%\multitool`
#[must_use = "cache directory path should be used"]
pub fn user_cache_dir() -> Result<PathBuf> {
    Ok(dirs::cache_dir()
        .context("Could not determine user cache directory")?
        .join(APP_DIR))
}

/// Path of the global configuration file, `<config dir>/config.yaml`.
#[must_use = "global configuration path should be used"]
pub fn global_config_path() -> Result<PathBuf> {
    Ok(user_config_dir()?.join("config.yaml"))
}

/// Shared compiled-resource cache, `<cache dir>/resources`.
///
/// Shared across plugins and invocations; nothing expires it automatically.
#[must_use = "resource cache path should be used"]
pub fn resource_cache_dir() -> Result<PathBuf> {
    Ok(user_cache_dir()?.join("resources"))
}
