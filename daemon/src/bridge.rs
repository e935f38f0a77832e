/// Host bridge: the UI host drives the daemon with JSON lines on stdin.
///
/// # Protocol
///
/// One JSON object per line, tagged by `type`:
///
/// ```json
/// {"type": "events", "events": [{"name": "kill", "data": {"headshot": true}}]}
/// {"type": "info", "info": {"match_info": {"round_phase": "live"}}}
/// {"type": "launch", "source": "gamelaunchevent"}
/// {"type": "surfaceState", "surface": "in_game", "state": "minimized"}
/// ```
///
/// `events` and `info` form the game feature stream and are only passed on
/// after the controller has subscribed with a feature list. `launch` is an
/// app re-launch trigger; `surfaceState` reports a window change made by the
/// user in the host.
use anyhow::{bail, Result};
use serde::Deserialize;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

use crate::event::{AppEvent, LaunchSource};
use crate::surfaces::{LocalSurfaces, SurfaceName, SurfaceState};
use crate::telemetry::{FeatureStreamProvider, InfoSnapshot, TelemetryEvent};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostMessage {
    Events { events: Vec<TelemetryEvent> },
    Info { info: InfoSnapshot },
    Launch {
        #[serde(default)]
        source: Option<String>,
    },
    SurfaceState {
        surface: SurfaceName,
        state: SurfaceState,
    },
}

/// Feature stream fed by the host over stdin.
#[derive(Clone, Default)]
pub struct HostFeed {
    inner: Arc<FeedState>,
}

#[derive(Default)]
struct FeedState {
    features: Mutex<Option<Vec<String>>>,
    closed: AtomicBool,
}

impl HostFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner
            .features
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Marks the host as gone; later subscriptions fail.
    fn close(&self) {
        self.inner.closed.store(true, Ordering::Relaxed);
    }
}

impl FeatureStreamProvider for HostFeed {
    async fn subscribe(&self, features: &[String]) -> Result<()> {
        if self.inner.closed.load(Ordering::Relaxed) {
            bail!("host feed is closed");
        }
        if features.is_empty() {
            bail!("no features requested");
        }
        *self
            .inner
            .features
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(features.to_vec());
        Ok(())
    }
}

/// Starts a thread that reads host messages from stdin until EOF.
pub fn start(
    feed: HostFeed,
    surfaces: LocalSurfaces,
    tx: mpsc::Sender<AppEvent>,
) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("host-bridge".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            pump(stdin.lock(), &feed, &surfaces, &tx);
        })
}

/// Reads lines from `reader` and applies each message. Closes `feed` on EOF,
/// read error, or when the event loop has gone away.
fn pump<R: BufRead>(reader: R, feed: &HostFeed, surfaces: &LocalSurfaces, tx: &mpsc::Sender<AppEvent>) {
    tracing::debug!(target: "bridge", "Host listener started");
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(target: "bridge", "Error reading stdin: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<HostMessage>(&line) {
            Ok(message) => {
                if !dispatch(message, feed, surfaces, tx) {
                    break;
                }
            }
            Err(e) => tracing::warn!(target: "bridge", "Ignoring malformed message: {e}"),
        }
    }
    feed.close();
    tracing::info!(target: "bridge", "Host listener exiting");
}

/// Returns `false` once the event loop is gone.
fn dispatch(
    message: HostMessage,
    feed: &HostFeed,
    surfaces: &LocalSurfaces,
    tx: &mpsc::Sender<AppEvent>,
) -> bool {
    let event = match message {
        HostMessage::Events { events } if feed.is_subscribed() => AppEvent::GameEvents(events),
        HostMessage::Info { info } if feed.is_subscribed() => AppEvent::InfoUpdate(info),
        HostMessage::Events { .. } | HostMessage::Info { .. } => {
            tracing::debug!(target: "bridge", "Dropping telemetry, no active subscription");
            return true;
        }
        HostMessage::Launch { source } => {
            AppEvent::LaunchTriggered(LaunchSource::from_marker(source.as_deref()))
        }
        HostMessage::SurfaceState { surface, state } => {
            surfaces.report(surface, state);
            return true;
        }
    };
    tx.blocking_send(event).is_ok()
}
