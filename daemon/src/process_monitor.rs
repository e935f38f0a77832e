use std::sync::Arc;
use sysinfo::{ProcessesToUpdate, System};
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, Duration};

use crate::config::{Config, GameConfig};
use crate::event::AppEvent;
use crate::game::{GameInfo, GameStateProvider};

const POLL_INTERVAL_SECS: u64 = 2;

/// Game state provider backed by the OS process list.
///
/// A game counts as running while a process with its configured executable
/// name exists. If several configured games run at once, the first one in
/// the config list wins.
#[derive(Clone)]
pub struct ProcessGameState {
    config: Arc<RwLock<Config>>,
}

impl ProcessGameState {
    pub fn new(config: Arc<RwLock<Config>>) -> Self {
        Self { config }
    }

    /// Scans the process list once on a blocking thread.
    async fn scan(&self) -> Option<GameConfig> {
        let games = self.config.read().await.games.clone();
        match tokio::task::spawn_blocking(move || {
            let mut sys = System::new();
            sys.refresh_processes(ProcessesToUpdate::All, false);
            find_running(&sys, &games)
        })
        .await
        {
            Ok(found) => found,
            Err(e) => {
                tracing::error!(target: "monitor", "Process scan failed: {e}");
                None
            }
        }
    }
}

impl GameStateProvider for ProcessGameState {
    async fn running_game_info(&self) -> Option<GameInfo> {
        self.scan().await.map(|game| GameInfo::running(game.class_id))
    }

    async fn is_game_running(&self) -> bool {
        self.scan().await.is_some()
    }
}

/// Returns the first configured game with a matching process in `sys`.
fn find_running(sys: &System, games: &[GameConfig]) -> Option<GameConfig> {
    games
        .iter()
        .find(|game| {
            game.executable_name.as_deref().is_some_and(|exe| {
                let names = sys
                    .processes()
                    .values()
                    .map(|p| p.name().to_string_lossy().into_owned());
                matches_executable(names, exe)
            })
        })
        .cloned()
}

/// Case-insensitive executable-name match.
fn matches_executable<I>(process_names: I, executable: &str) -> bool
where
    I: IntoIterator<Item = String>,
{
    let target = executable.to_lowercase();
    process_names.into_iter().any(|n| n.to_lowercase() == target)
}

/// Polls the OS process list every [`POLL_INTERVAL_SECS`] seconds and emits
/// [`AppEvent::GameRunningChanged`] whenever a configured game appears or disappears.
pub async fn run(config: Arc<RwLock<Config>>, tx: mpsc::Sender<AppEvent>) {
    let mut sys = System::new();
    let mut active: Option<u32> = None;
    let mut ticker = interval(Duration::from_secs(POLL_INTERVAL_SECS));

    loop {
        ticker.tick().await;

        sys.refresh_processes(ProcessesToUpdate::All, false);

        let found = {
            let config = config.read().await;
            find_running(&sys, &config.games)
        };

        match (active, found) {
            (None, Some(game)) => {
                tracing::info!(target: "monitor", "Detected: {}", game.display_name);
                active = Some(game.class_id);
                if tx.send(AppEvent::GameRunningChanged(true)).await.is_err() {
                    break;
                }
            }
            (Some(class_id), None) => {
                tracing::info!(target: "monitor", "Exited: class {class_id}");
                active = None;
                if tx.send(AppEvent::GameRunningChanged(false)).await.is_err() {
                    break;
                }
            }
            _ => {} // No change.
        }
    }
}
