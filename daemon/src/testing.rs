/// Recording in-memory collaborators for controller and dispatcher tests.
use anyhow::{bail, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::game::{GameInfo, GameStateProvider};
use crate::surfaces::{SurfaceName, SurfaceRegistry, SurfaceState, SurfaceStates};
use crate::telemetry::FeatureStreamProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceCall {
    Restore(SurfaceName),
    Close(SurfaceName),
}

/// Surface registry that applies calls to a plain map and records them.
#[derive(Default)]
pub struct FakeSurfaces {
    states: Mutex<SurfaceStates>,
    calls: Mutex<Vec<SurfaceCall>>,
}

impl FakeSurfaces {
    /// All four surfaces, background open, the rest closed.
    pub fn new() -> Self {
        let fake = Self::default();
        for name in SurfaceName::ALL {
            fake.set(name, SurfaceState::Closed);
        }
        fake.set(SurfaceName::Background, SurfaceState::Normal);
        fake
    }

    pub fn with(states: &[(SurfaceName, SurfaceState)]) -> Self {
        let fake = Self::new();
        for (name, state) in states {
            fake.set(*name, *state);
        }
        fake
    }

    pub fn set(&self, name: SurfaceName, state: SurfaceState) {
        self.states.lock().unwrap().insert(name, state);
    }

    pub fn state(&self, name: SurfaceName) -> SurfaceState {
        crate::surfaces::state_of(&self.states.lock().unwrap(), name)
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: SurfaceCall) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl SurfaceRegistry for FakeSurfaces {
    async fn restore(&self, name: SurfaceName) -> Result<()> {
        self.calls.lock().unwrap().push(SurfaceCall::Restore(name));
        self.set(name, SurfaceState::Normal);
        Ok(())
    }

    async fn close(&self, name: SurfaceName) -> Result<()> {
        self.calls.lock().unwrap().push(SurfaceCall::Close(name));
        self.set(name, SurfaceState::Closed);
        Ok(())
    }

    async fn states(&self) -> Result<SurfaceStates> {
        Ok(self.states.lock().unwrap().clone())
    }
}

/// Game state provider returning whatever the test last set.
#[derive(Default)]
pub struct FakeGames {
    info: Mutex<Option<GameInfo>>,
}

impl FakeGames {
    pub fn set(&self, info: Option<GameInfo>) {
        *self.info.lock().unwrap() = info;
    }
}

impl GameStateProvider for FakeGames {
    async fn running_game_info(&self) -> Option<GameInfo> {
        *self.info.lock().unwrap()
    }

    async fn is_game_running(&self) -> bool {
        self.info.lock().unwrap().is_some_and(|g| g.is_running)
    }
}

/// Feature stream that records every subscription attempt.
#[derive(Default)]
pub struct FakeFeed {
    subscriptions: Mutex<Vec<Vec<String>>>,
    fail: AtomicBool,
}

impl FakeFeed {
    pub fn fail_subscriptions(&self) {
        self.fail.store(true, Ordering::Relaxed);
    }

    pub fn subscriptions(&self) -> Vec<Vec<String>> {
        self.subscriptions.lock().unwrap().clone()
    }
}

impl FeatureStreamProvider for FakeFeed {
    async fn subscribe(&self, features: &[String]) -> Result<()> {
        self.subscriptions.lock().unwrap().push(features.to_vec());
        if self.fail.load(Ordering::Relaxed) {
            bail!("provider rejected subscription");
        }
        Ok(())
    }
}
