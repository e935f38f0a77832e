/// Debounced shutdown: the daemon exits only when, both now and again after
/// [`SHUTDOWN_DELAY`], no game is running and every UI surface is closed.
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::event::AppEvent;
use crate::game::GameStateProvider;
use crate::surfaces::{SurfaceName, SurfaceRegistry, SurfaceState, SurfaceStates};

pub const SHUTDOWN_DELAY: Duration = Duration::from_secs(10);

/// True when no game is running and every surface but the background is closed.
/// A registry error counts as "not safe".
pub async fn can_shutdown<G, S>(games: &G, surfaces: &S) -> bool
where
    G: GameStateProvider,
    S: SurfaceRegistry,
{
    // Never exit mid-game, telemetry would be lost.
    if games.is_game_running().await {
        return false;
    }
    match surfaces.states().await {
        Ok(states) => all_ui_closed(&states),
        Err(e) => {
            tracing::warn!(target: "shutdown", "Could not read surface states: {e:#}");
            false
        }
    }
}

pub fn all_ui_closed(states: &SurfaceStates) -> bool {
    states
        .iter()
        .filter(|(name, _)| **name != SurfaceName::Background)
        .all(|(_, state)| *state == SurfaceState::Closed)
}

/// Owns the single pending shutdown timer.
///
/// The timer posts [`AppEvent::ShutdownTimerElapsed`] tagged with its
/// generation; arming again or cancelling makes any older tag stale.
pub struct ShutdownArbiter {
    delay: Duration,
    tx: mpsc::Sender<AppEvent>,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl ShutdownArbiter {
    pub fn new(tx: mpsc::Sender<AppEvent>, delay: Duration) -> Self {
        Self {
            delay,
            tx,
            generation: 0,
            pending: None,
        }
    }

    /// Starts a fresh timer, superseding any pending one.
    pub fn arm(&mut self) {
        self.cancel();
        self.generation += 1;

        let generation = self.generation;
        let delay = self.delay;
        let tx = self.tx.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(AppEvent::ShutdownTimerElapsed(generation)).await;
        }));
        tracing::debug!(target: "shutdown", "Timer {generation} armed ({}s)", delay.as_secs());
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
            tracing::debug!(target: "shutdown", "Timer {} cancelled", self.generation);
        }
    }

    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Claims an elapsed timer. Returns `false` for a stale or cancelled one.
    pub fn take_elapsed(&mut self, generation: u64) -> bool {
        if self.pending.is_some() && generation == self.generation {
            self.pending = None;
            true
        } else {
            false
        }
    }
}

impl Drop for ShutdownArbiter {
    fn drop(&mut self) {
        self.cancel();
    }
}
