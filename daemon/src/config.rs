use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use crate::event::AppEvent;

pub const DEFAULT_SINK_ENDPOINT: &str = "http://localhost:5000/event";
pub const DEFAULT_TOGGLE_HOTKEY: &str = "Ctrl+F9";
pub const DEFAULT_SECOND_SCREEN_HOTKEY: &str = "Ctrl+F10";

pub const VALORANT_CLASS_ID: u32 = 21640;
const VALORANT_FEATURES: &[&str] = &[
    "kill",
    "kill_feed",
    "death",
    "match_info",
    "match",
    "match_end",
    "match_stats",
    "round",
    "round_start",
    "round_end",
    "spike_defused",
    "spike_detonated",
    "match_start",
    "player",
];

/// Root configuration structure. Deserialized from `<config dir>/Overlay/config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,
    /// Supported games. An empty or missing table falls back to the built-in catalog.
    #[serde(default = "default_games")]
    pub games: Vec<GameConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            global: GlobalConfig::default(),
            games: default_games(),
        }
    }
}

impl Config {
    /// Looks up a supported game by its class id.
    pub fn game(&self, class_id: u32) -> Option<&GameConfig> {
        self.games.iter().find(|g| g.class_id == class_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalConfig {
    /// URL of the external telemetry sink. Deliveries are sent as
    /// `GET <endpoint>?name=..&data=..`.
    #[serde(default = "default_sink_endpoint")]
    pub sink_endpoint: String,
    /// Binding for the in-game toggle hotkey (e.g. "Ctrl+F9").
    #[serde(default = "default_toggle_hotkey")]
    pub toggle_hotkey: String,
    /// Binding for the second-screen toggle hotkey.
    #[serde(default = "default_second_screen_hotkey")]
    pub second_screen_hotkey: String,
    /// Overrides monitor detection. Read once at startup.
    #[serde(default)]
    pub multiple_monitors: Option<bool>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            sink_endpoint: DEFAULT_SINK_ENDPOINT.to_string(),
            toggle_hotkey: DEFAULT_TOGGLE_HOTKEY.to_string(),
            second_screen_hotkey: DEFAULT_SECOND_SCREEN_HOTKEY.to_string(),
            multiple_monitors: None,
        }
    }
}

/// A supported game and the telemetry features requested while it runs.
#[derive(Debug, Clone, Deserialize)]
pub struct GameConfig {
    pub class_id: u32,
    pub display_name: String,
    /// Executable filename used for process detection. Games without one are
    /// still supported but never detected by the process monitor.
    #[serde(default)]
    pub executable_name: Option<String>,
    /// Ordered feature list passed to the feature stream on subscription.
    #[serde(default)]
    pub features: Vec<String>,
}

/// Loads the config file at `path`, returning `Config::default()` if the file does not exist.
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    if config.games.is_empty() {
        config.games = default_games();
    }
    Ok(config)
}

/// Watches the parent directory of `path`. Whenever the config file is created
/// or modified, reloads it and sends a `ConfigReloaded` event.
pub async fn watch_config(path: PathBuf, tx: mpsc::Sender<AppEvent>) {
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Event>(16);

    let mut watcher = match RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = watch_tx.blocking_send(event);
            }
        },
        NotifyConfig::default(),
    ) {
        Ok(w) => w,
        Err(e) => {
            tracing::warn!(target: "config", "Failed to create file watcher: {e}");
            return;
        }
    };

    // Editors save atomically (write-new + rename), so watch the directory.
    let watch_dir = match path.parent() {
        Some(d) => d.to_path_buf(),
        None => {
            tracing::warn!(target: "config", "Config path has no parent directory");
            return;
        }
    };

    if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
        tracing::warn!(target: "config", "Failed to watch config directory: {e}");
        return;
    }

    while let Some(event) = watch_rx.recv().await {
        let affects_config = event.paths.iter().any(|p| p == path.as_path());
        let is_write = matches!(
            event.kind,
            notify::EventKind::Create(_) | notify::EventKind::Modify(_)
        );

        if affects_config && is_write {
            match load_or_default(&path) {
                Ok(config) => {
                    if tx.send(AppEvent::ConfigReloaded(config)).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::error!(target: "config", "Failed to reload config: {e:#}"),
            }
        }
    }
}

fn default_sink_endpoint() -> String {
    DEFAULT_SINK_ENDPOINT.to_string()
}

fn default_toggle_hotkey() -> String {
    DEFAULT_TOGGLE_HOTKEY.to_string()
}

fn default_second_screen_hotkey() -> String {
    DEFAULT_SECOND_SCREEN_HOTKEY.to_string()
}

fn default_games() -> Vec<GameConfig> {
    vec![GameConfig {
        class_id: VALORANT_CLASS_ID,
        display_name: "VALORANT".to_string(),
        executable_name: Some("VALORANT-Win64-Shipping.exe".to_string()),
        features: VALORANT_FEATURES.iter().map(|f| f.to_string()).collect(),
    }]
}
