/// Canonical file paths for overlay data files.
///
/// Both files live under `<config dir>/Overlay/` (`%APPDATA%\Overlay\` on Windows):
///   - config.toml  Edited by the user, read by the daemon.
///   - status.toml  Written by the daemon, read by the UI host.
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "Overlay";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const STATUS_FILE_NAME: &str = "status.toml";

/// Returns the overlay application data directory.
pub fn app_data_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("No per-user config directory on this platform")?;
    Ok(base.join(APP_DIR_NAME))
}

pub fn config_file_path(app_dir: &Path) -> PathBuf {
    app_dir.join(CONFIG_FILE_NAME)
}

pub fn status_file_path(app_dir: &Path) -> PathBuf {
    app_dir.join(STATUS_FILE_NAME)
}
