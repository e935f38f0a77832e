use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::surfaces::{SurfaceState, SurfaceStates};

/// Surface status written by the daemon to `<config dir>/Overlay/status.toml`.
/// The UI host reads this file (read-only) to know which windows to show.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SurfaceStatus {
    /// Daemon binary version (set from Cargo.toml at compile time).
    pub version: String,
    /// RFC 3339 timestamp of the last surface change.
    pub updated_at: String,
    /// State of every surface, keyed by surface name.
    pub surfaces: BTreeMap<String, SurfaceState>,
}

impl SurfaceStatus {
    pub fn from_states(states: &SurfaceStates) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            updated_at: chrono::Local::now().to_rfc3339(),
            surfaces: states
                .iter()
                .map(|(name, state)| (name.as_str().to_string(), *state))
                .collect(),
        }
    }
}

/// Serializes `status` to TOML and writes it to `path`.
/// Creates the parent directory if it does not exist.
/// A status write failure is logged and never stops the daemon.
pub fn write_status(path: &Path, status: &SurfaceStatus) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!(target: "status", "Failed to create directory {}: {e}", parent.display());
            return;
        }
    }
    match toml::to_string_pretty(status) {
        Ok(content) => {
            if let Err(e) = std::fs::write(path, content) {
                tracing::warn!(target: "status", "Failed to write status file: {e}");
            }
        }
        Err(e) => tracing::warn!(target: "status", "Failed to serialize status: {e}"),
    }
}
