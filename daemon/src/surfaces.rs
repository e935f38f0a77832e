/// UI surfaces and the registry that restores, closes and reports them.
///
/// The registry is the source of truth for which surface is showing. Nothing in
/// the daemon caches a "current surface"; every decision re-reads [`SurfaceRegistry::states`].
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;

use crate::status::{self, SurfaceStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceName {
    /// The daemon itself. Never user-visible, never counted for shutdown.
    Background,
    Desktop,
    InGame,
    SecondScreen,
}

impl SurfaceName {
    pub const ALL: [SurfaceName; 4] = [
        SurfaceName::Background,
        SurfaceName::Desktop,
        SurfaceName::InGame,
        SurfaceName::SecondScreen,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SurfaceName::Background => "background",
            SurfaceName::Desktop => "desktop",
            SurfaceName::InGame => "in_game",
            SurfaceName::SecondScreen => "second_screen",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceState {
    Normal,
    Maximized,
    Minimized,
    Hidden,
    Closed,
}

impl SurfaceState {
    /// Every state other than `Closed` counts as open.
    pub fn is_open(self) -> bool {
        self != SurfaceState::Closed
    }
}

pub type SurfaceStates = BTreeMap<SurfaceName, SurfaceState>;

/// State of `name` in `states`; a surface the registry does not report is closed.
pub fn state_of(states: &SurfaceStates, name: SurfaceName) -> SurfaceState {
    states.get(&name).copied().unwrap_or(SurfaceState::Closed)
}

pub fn is_open(states: &SurfaceStates, name: SurfaceName) -> bool {
    state_of(states, name).is_open()
}

/// Window surface manager the controller and hotkeys act on.
///
/// `restore` and `close` are idempotent: closing a closed surface is a no-op.
pub trait SurfaceRegistry {
    async fn restore(&self, name: SurfaceName) -> Result<()>;
    async fn close(&self, name: SurfaceName) -> Result<()>;
    async fn states(&self) -> Result<SurfaceStates>;
}

/// In-process surface registry shared with the UI host.
///
/// Every real state change is mirrored to the status file and raises a
/// coalescing signal the event loop turns into
/// [`AppEvent::WindowStateChanged`](crate::event::AppEvent::WindowStateChanged).
/// Changes made while a signal is pending fold into it; none is dropped.
#[derive(Clone)]
pub struct LocalSurfaces {
    states: Arc<Mutex<SurfaceStates>>,
    changed: Arc<Notify>,
    status_path: Option<PathBuf>,
}

impl LocalSurfaces {
    /// Starts with only the background surface open.
    pub fn new(status_path: Option<PathBuf>) -> Self {
        let states = SurfaceName::ALL
            .into_iter()
            .map(|name| {
                let state = if name == SurfaceName::Background {
                    SurfaceState::Normal
                } else {
                    SurfaceState::Closed
                };
                (name, state)
            })
            .collect::<SurfaceStates>();

        let surfaces = Self {
            states: Arc::new(Mutex::new(states)),
            changed: Arc::new(Notify::new()),
            status_path,
        };
        surfaces.persist(&surfaces.snapshot());
        surfaces
    }

    /// Records a state change made outside the daemon (e.g. the user closed a window).
    /// Returns whether the state actually changed.
    pub fn report(&self, name: SurfaceName, state: SurfaceState) -> bool {
        self.set(name, state)
    }

    /// Resolves once at least one state change happened since the last call.
    pub async fn changed(&self) {
        self.changed.notified().await;
    }

    fn snapshot(&self) -> SurfaceStates {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, name: SurfaceName, state: SurfaceState) -> bool {
        let changed = {
            let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
            let previous = states.insert(name, state);
            (previous != Some(state)).then(|| states.clone())
        };

        let Some(snapshot) = changed else {
            return false;
        };

        tracing::debug!(target: "surfaces", "{} -> {:?}", name.as_str(), state);
        self.persist(&snapshot);
        // Stores a single permit when nobody is waiting.
        self.changed.notify_one();
        true
    }

    fn persist(&self, states: &SurfaceStates) {
        if let Some(path) = &self.status_path {
            status::write_status(path, &SurfaceStatus::from_states(states));
        }
    }
}

impl SurfaceRegistry for LocalSurfaces {
    async fn restore(&self, name: SurfaceName) -> Result<()> {
        self.set(name, SurfaceState::Normal);
        Ok(())
    }

    async fn close(&self, name: SurfaceName) -> Result<()> {
        self.set(name, SurfaceState::Closed);
        Ok(())
    }

    async fn states(&self) -> Result<SurfaceStates> {
        Ok(self.snapshot())
    }
}
