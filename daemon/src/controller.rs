/// Window lifecycle controller: decides which surface shows in response to
/// game starts/stops, launch triggers, hotkeys and telemetry, and arbitrates
/// the debounced shutdown.
///
/// The controller never caches the current surface. Each handler re-reads the
/// registry and the game state provider, so interleaved triggers from
/// independent sources cannot leave a contradictory layout behind.
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use crate::bus::SharedState;
use crate::commands;
use crate::config::Config;
use crate::display::MonitorConfig;
use crate::event::{AppEvent, LaunchSource};
use crate::game::GameStateProvider;
use crate::hotkey::HotkeyCommand;
use crate::router::EventRouter;
use crate::shutdown::{self, ShutdownArbiter, SHUTDOWN_DELAY};
use crate::sink::SinkHandle;
use crate::surfaces::{SurfaceName, SurfaceRegistry};
use crate::telemetry::{FeatureStreamProvider, InfoSnapshot, TelemetryEvent};

/// What the event loop should do after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// External collaborators the controller drives.
pub struct Services<S, G, F> {
    pub surfaces: S,
    pub games: G,
    pub features: F,
}

pub struct Controller<S, G, F> {
    surfaces: S,
    games: G,
    features: F,
    config: Arc<RwLock<Config>>,
    monitors: MonitorConfig,
    launch_source: LaunchSource,
    shared: Arc<SharedState>,
    router: EventRouter,
    shutdown: ShutdownArbiter,
}

impl<S, G, F> Controller<S, G, F>
where
    S: SurfaceRegistry,
    G: GameStateProvider,
    F: FeatureStreamProvider,
{
    pub fn new(
        services: Services<S, G, F>,
        config: Arc<RwLock<Config>>,
        monitors: MonitorConfig,
        launch_source: LaunchSource,
        shared: Arc<SharedState>,
        sink: SinkHandle,
        tx: mpsc::Sender<AppEvent>,
    ) -> Self {
        Self {
            surfaces: services.surfaces,
            games: services.games,
            features: services.features,
            config,
            monitors,
            launch_source,
            router: EventRouter::new(Arc::clone(&shared), sink),
            shared,
            shutdown: ShutdownArbiter::new(tx, SHUTDOWN_DELAY),
        }
    }

    /// Applies one event-loop message.
    pub async fn handle(&mut self, event: AppEvent) -> Flow {
        match event {
            AppEvent::GameRunningChanged(is_running) => {
                self.on_game_running_changed(is_running).await
            }
            AppEvent::LaunchTriggered(source) => {
                // The game-launch path is covered by GameRunningChanged.
                if source != LaunchSource::GameLaunchEvent {
                    self.restore_app_window().await;
                }
            }
            AppEvent::WindowStateChanged => self.on_window_state_changed().await,
            AppEvent::Hotkey(command) => self.on_hotkey(command).await,
            AppEvent::GameEvents(batch) => self.on_game_events(batch).await,
            AppEvent::InfoUpdate(snapshot) => self.on_info_update(snapshot),
            AppEvent::ShutdownTimerElapsed(generation) => {
                return self.on_shutdown_timer(generation).await;
            }
            AppEvent::ConfigReloaded(config) => {
                tracing::info!(target: "config", "Config reloaded");
                *self.config.write().await = config;
            }
            AppEvent::Shutdown => {
                tracing::info!("Shutting down");
                return Flow::Exit;
            }
        }
        Flow::Continue
    }

    /// Switches between the desktop window and the game surface when a game
    /// starts or stops.
    pub async fn on_game_running_changed(&self, is_running: bool) {
        if !is_running {
            self.restore(SurfaceName::Desktop).await;
            self.close(SurfaceName::InGame).await;
            self.close(SurfaceName::SecondScreen).await;
            return;
        }

        // Providers can report a start before their game info catches up.
        let Some(info) = self.games.running_game_info().await else {
            return;
        };
        let Some(class_id) = info.class_id.filter(|_| info.is_running) else {
            return;
        };
        let Some(features) = self.features_for(class_id).await else {
            tracing::debug!(target: "controller", "Ignoring unsupported game class {class_id}");
            return;
        };

        tracing::info!(target: "controller", "Game session started (class {class_id})");
        self.shared.reset_session();

        tokio::join!(self.subscribe(class_id, &features), self.restore_game_window());
        self.close(SurfaceName::Desktop).await;
    }

    /// Opens the right surface at process start.
    pub async fn restore_launch_window(&self) {
        let info = self
            .games
            .running_game_info()
            .await
            .filter(|info| info.is_running);
        let Some(info) = info else {
            self.restore(SurfaceName::Desktop).await;
            return;
        };

        let Some(class_id) = info.class_id else {
            return;
        };
        let Some(features) = self.features_for(class_id).await else {
            return;
        };

        self.subscribe(class_id, &features).await;

        // A game-launch start is followed by its own GameRunningChanged.
        if self.launch_source != LaunchSource::GameLaunchEvent {
            self.restore_game_window().await;
        }
    }

    /// Opens the right surface when the user launches the app again.
    pub async fn restore_app_window(&self) {
        if self.games.is_game_running().await {
            self.restore_game_window().await;
        } else {
            self.restore(SurfaceName::Desktop).await;
        }
    }

    /// The surface that represents the game for this process.
    pub fn game_surface(&self) -> SurfaceName {
        if self.monitors.has_multiple_monitors {
            SurfaceName::SecondScreen
        } else {
            SurfaceName::InGame
        }
    }

    pub async fn restore_game_window(&self) {
        self.restore(self.game_surface()).await;
    }

    /// Arms the shutdown timer when nothing needs the process, cancels it otherwise.
    pub async fn on_window_state_changed(&mut self) {
        if shutdown::can_shutdown(&self.games, &self.surfaces).await {
            self.shutdown.arm();
        } else {
            self.shutdown.cancel();
        }
    }

    /// Re-checks after the debounce delay; exits only if still safe.
    pub async fn on_shutdown_timer(&mut self, generation: u64) -> Flow {
        if !self.shutdown.take_elapsed(generation) {
            return Flow::Continue;
        }
        if shutdown::can_shutdown(&self.games, &self.surfaces).await {
            tracing::info!(target: "shutdown", "No open surfaces and no game running, exiting");
            Flow::Exit
        } else {
            tracing::debug!(target: "shutdown", "Shutdown aborted on re-check");
            Flow::Continue
        }
    }

    pub async fn on_hotkey(&self, command: HotkeyCommand) {
        if let Err(e) = commands::run(command, &self.surfaces).await {
            tracing::warn!(target: "controller", "Hotkey {command:?} failed: {e:#}");
        }
    }

    /// Routes a batch in arrival order. A match start re-applies the game
    /// surface before the next event is handled.
    pub async fn on_game_events(&self, batch: Vec<TelemetryEvent>) {
        for event in batch {
            if self.router.on_event(event) {
                self.restore_game_window().await;
            }
        }
    }

    pub fn on_info_update(&self, snapshot: InfoSnapshot) {
        self.router.on_info_update(snapshot);
    }

    async fn features_for(&self, class_id: u32) -> Option<Vec<String>> {
        let config = self.config.read().await;
        config.game(class_id).map(|game| game.features.clone())
    }

    /// Failure leaves this session without telemetry until the next game start.
    async fn subscribe(&self, class_id: u32, features: &[String]) {
        if features.is_empty() {
            tracing::warn!(target: "controller", "No features configured for class {class_id}");
            return;
        }
        match self.features.subscribe(features).await {
            Ok(()) => tracing::info!(target: "controller", "Features registered: {features:?}"),
            Err(e) => tracing::error!(target: "controller", "Failed to register features: {e:#}"),
        }
    }

    async fn restore(&self, name: SurfaceName) {
        if let Err(e) = self.surfaces.restore(name).await {
            tracing::warn!(target: "controller", "Failed to restore {}: {e:#}", name.as_str());
        }
    }

    async fn close(&self, name: SurfaceName) {
        if let Err(e) = self.surfaces.close(name).await {
            tracing::warn!(target: "controller", "Failed to close {}: {e:#}", name.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Topic;
    use crate::config::VALORANT_CLASS_ID;
    use crate::game::GameInfo;
    use crate::sink::Delivery;
    use crate::surfaces::SurfaceState;
    use crate::testing::{FakeFeed, FakeGames, FakeSurfaces, SurfaceCall};
    use serde_json::json;
    use std::time::Duration;

    type TestController = Controller<FakeSurfaces, FakeGames, FakeFeed>;

    struct Harness {
        controller: TestController,
        shared: Arc<SharedState>,
        events: mpsc::Receiver<AppEvent>,
        deliveries: mpsc::Receiver<Delivery>,
    }

    fn harness(multiple_monitors: bool, launch_source: LaunchSource) -> Harness {
        let (tx, events) = mpsc::channel(16);
        let (sink, deliveries) = SinkHandle::channel();
        let shared = Arc::new(SharedState::new());
        let controller = Controller::new(
            Services {
                surfaces: FakeSurfaces::new(),
                games: FakeGames::default(),
                features: FakeFeed::default(),
            },
            Arc::new(RwLock::new(Config::default())),
            MonitorConfig { has_multiple_monitors: multiple_monitors },
            launch_source,
            Arc::clone(&shared),
            sink,
            tx,
        );
        Harness { controller, shared, events, deliveries }
    }

    fn single() -> Harness {
        harness(false, LaunchSource::User)
    }

    fn seed_stores(shared: &SharedState) {
        shared.events.push(TelemetryEvent::new("kill", json!(null)));
        shared.info.push(InfoSnapshot(json!({"player": {"health": 1}})));
    }

    fn drain(rx: &mut mpsc::Receiver<Delivery>) -> Vec<Delivery> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    // ── game stopped ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn game_stop_closes_game_surfaces_and_restores_desktop() {
        let h = single();
        let s = &h.controller.surfaces;
        s.set(SurfaceName::InGame, SurfaceState::Normal);
        s.set(SurfaceName::SecondScreen, SurfaceState::Normal);

        h.controller.on_game_running_changed(false).await;

        assert_eq!(s.count(SurfaceCall::Close(SurfaceName::InGame)), 1);
        assert_eq!(s.count(SurfaceCall::Close(SurfaceName::SecondScreen)), 1);
        assert_eq!(s.count(SurfaceCall::Restore(SurfaceName::Desktop)), 1);
        assert_eq!(s.calls().len(), 3);
    }

    #[tokio::test]
    async fn repeated_game_stop_is_idempotent() {
        let h = single();
        let s = &h.controller.surfaces;
        for _ in 0..3 {
            h.controller.on_game_running_changed(false).await;
            assert!(s.state(SurfaceName::Desktop).is_open());
            assert!(!s.state(SurfaceName::InGame).is_open());
            assert!(!s.state(SurfaceName::SecondScreen).is_open());
        }
    }

    // ── game started ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn supported_game_start_resets_stores_and_shows_game_surface() {
        let h = single();
        seed_stores(&h.shared);
        h.controller.surfaces.set(SurfaceName::Desktop, SurfaceState::Normal);
        h.controller.games.set(Some(GameInfo::running(VALORANT_CLASS_ID)));

        h.controller.on_game_running_changed(true).await;

        assert!(h.shared.events.is_empty());
        assert!(h.shared.info.is_empty());
        let s = &h.controller.surfaces;
        assert!(s.state(SurfaceName::InGame).is_open());
        assert!(!s.state(SurfaceName::Desktop).is_open());
        assert!(!s.state(SurfaceName::SecondScreen).is_open());

        let subs = h.controller.features.subscriptions();
        assert_eq!(subs.len(), 1);
        assert!(subs[0].iter().any(|f| f == "match_info"));
    }

    #[tokio::test]
    async fn game_start_uses_second_screen_with_multiple_monitors() {
        let h = harness(true, LaunchSource::User);
        h.controller.games.set(Some(GameInfo::running(VALORANT_CLASS_ID)));

        h.controller.on_game_running_changed(true).await;

        let s = &h.controller.surfaces;
        assert!(s.state(SurfaceName::SecondScreen).is_open());
        assert!(!s.state(SurfaceName::InGame).is_open());
    }

    #[tokio::test]
    async fn unusable_game_info_changes_nothing() {
        let cases = [
            None,
            Some(GameInfo { is_running: false, class_id: Some(VALORANT_CLASS_ID) }),
            Some(GameInfo { is_running: true, class_id: None }),
            Some(GameInfo::running(5426)),
        ];
        for info in cases {
            let h = single();
            seed_stores(&h.shared);
            h.controller.games.set(info);

            h.controller.on_game_running_changed(true).await;

            assert!(h.controller.surfaces.calls().is_empty(), "{info:?}");
            assert_eq!(h.shared.events.len(), 1, "{info:?}");
            assert_eq!(h.shared.info.len(), 1, "{info:?}");
            assert!(h.controller.features.subscriptions().is_empty());
        }
    }

    #[tokio::test]
    async fn subscription_failure_still_restores_game_surface() {
        let h = single();
        h.controller.features.fail_subscriptions();
        h.controller.games.set(Some(GameInfo::running(VALORANT_CLASS_ID)));

        h.controller.on_game_running_changed(true).await;

        assert_eq!(h.controller.features.subscriptions().len(), 1);
        assert!(h.controller.surfaces.state(SurfaceName::InGame).is_open());
    }

    #[tokio::test]
    async fn game_without_features_skips_subscription() {
        let h = single();
        h.controller.config.write().await.games[0].features.clear();
        h.controller.games.set(Some(GameInfo::running(VALORANT_CLASS_ID)));

        h.controller.on_game_running_changed(true).await;

        assert!(h.controller.features.subscriptions().is_empty());
        assert!(h.controller.surfaces.state(SurfaceName::InGame).is_open());
    }

    // ── launch ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn launch_without_game_restores_desktop() {
        let h = single();
        h.controller.restore_launch_window().await;
        assert_eq!(
            h.controller.surfaces.calls(),
            vec![SurfaceCall::Restore(SurfaceName::Desktop)]
        );
        assert!(h.controller.features.subscriptions().is_empty());
    }

    #[tokio::test]
    async fn user_launch_during_game_subscribes_and_restores_game_surface() {
        let h = single();
        h.controller.games.set(Some(GameInfo::running(VALORANT_CLASS_ID)));

        h.controller.restore_launch_window().await;

        assert_eq!(h.controller.features.subscriptions().len(), 1);
        assert_eq!(
            h.controller.surfaces.calls(),
            vec![SurfaceCall::Restore(SurfaceName::InGame)]
        );
    }

    #[tokio::test]
    async fn game_launch_event_subscribes_without_surface_flip() {
        let h = harness(false, LaunchSource::GameLaunchEvent);
        h.controller.games.set(Some(GameInfo::running(VALORANT_CLASS_ID)));

        h.controller.restore_launch_window().await;

        assert_eq!(h.controller.features.subscriptions().len(), 1);
        assert!(h.controller.surfaces.calls().is_empty());
    }

    #[tokio::test]
    async fn launch_with_unsupported_game_does_nothing() {
        let h = single();
        h.controller.games.set(Some(GameInfo::running(5426)));
        h.controller.restore_launch_window().await;
        assert!(h.controller.surfaces.calls().is_empty());
        assert!(h.controller.features.subscriptions().is_empty());
    }

    #[tokio::test]
    async fn relaunch_picks_surface_from_game_state() {
        let mut h = single();
        h.controller.handle(AppEvent::LaunchTriggered(LaunchSource::User)).await;
        assert_eq!(
            h.controller.surfaces.calls(),
            vec![SurfaceCall::Restore(SurfaceName::Desktop)]
        );

        h.controller.surfaces.clear_calls();
        h.controller.games.set(Some(GameInfo::running(VALORANT_CLASS_ID)));
        h.controller.handle(AppEvent::LaunchTriggered(LaunchSource::User)).await;
        assert_eq!(
            h.controller.surfaces.calls(),
            vec![SurfaceCall::Restore(SurfaceName::InGame)]
        );
    }

    #[tokio::test]
    async fn game_launch_relaunch_is_ignored() {
        let mut h = single();
        h.controller
            .handle(AppEvent::LaunchTriggered(LaunchSource::GameLaunchEvent))
            .await;
        assert!(h.controller.surfaces.calls().is_empty());
    }

    // ── game surface choice ───────────────────────────────────────────────────

    #[tokio::test]
    async fn game_surface_follows_monitor_config() {
        assert_eq!(harness(true, LaunchSource::User).controller.game_surface(), SurfaceName::SecondScreen);
        assert_eq!(single().controller.game_surface(), SurfaceName::InGame);
    }

    // ── telemetry ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn kill_and_match_start_batch() {
        let mut h = single();
        let mut bus = h.shared.bus.subscribe(Topic::Event);

        h.controller
            .handle(AppEvent::GameEvents(vec![
                TelemetryEvent::new("kill", json!({})),
                TelemetryEvent::new("match_start", json!({})),
            ]))
            .await;

        let stored: Vec<_> = h.shared.events.values().into_iter().map(|e| e.name).collect();
        assert_eq!(stored, vec!["kill", "match_start"]);
        assert!(bus.try_recv().is_some());
        assert!(bus.try_recv().is_some());
        assert!(bus.try_recv().is_none());

        let names: Vec<_> = drain(&mut h.deliveries).into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["kill", "match_start"]);

        assert_eq!(
            h.controller.surfaces.calls(),
            vec![SurfaceCall::Restore(SurfaceName::InGame)]
        );
    }

    #[tokio::test]
    async fn info_update_scenarios() {
        let mut h = single();
        h.controller
            .handle(AppEvent::InfoUpdate(InfoSnapshot(json!({"player": {"health": 57}}))))
            .await;
        let d = drain(&mut h.deliveries);
        assert_eq!(d.len(), 1);
        assert_eq!((d[0].name.as_str(), d[0].data.as_str()), ("health", "57"));

        h.controller
            .handle(AppEvent::InfoUpdate(InfoSnapshot(json!({
                "match_info": {"round_phase": "live", "score": "3-2"}
            }))))
            .await;
        let names: Vec<_> = drain(&mut h.deliveries).into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["round_phase", "score"]);
        assert_eq!(h.shared.info.len(), 2);
    }

    // ── hotkeys ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn hotkeys_reach_the_dispatcher() {
        let mut h = single();
        h.controller.handle(AppEvent::Hotkey(HotkeyCommand::SecondScreen)).await;
        assert!(h.controller.surfaces.state(SurfaceName::SecondScreen).is_open());
        h.controller.handle(AppEvent::Hotkey(HotkeyCommand::Toggle)).await;
        assert!(!h.controller.surfaces.state(SurfaceName::SecondScreen).is_open());
        assert!(!h.controller.surfaces.state(SurfaceName::InGame).is_open());
    }

    // ── shutdown ──────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn exits_when_still_idle_after_delay() {
        let mut h = single();
        h.controller.handle(AppEvent::WindowStateChanged).await;

        let timer = h.events.recv().await.unwrap();
        assert!(matches!(timer, AppEvent::ShutdownTimerElapsed(_)));
        assert_eq!(h.controller.handle(timer).await, Flow::Exit);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_does_not_exit() {
        let mut h = single();
        h.controller.handle(AppEvent::WindowStateChanged).await;

        h.controller.surfaces.set(SurfaceName::Desktop, SurfaceState::Normal);
        h.controller.handle(AppEvent::WindowStateChanged).await;

        let fired = tokio::time::timeout(Duration::from_secs(60), h.events.recv()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn game_start_during_delay_aborts_shutdown() {
        let mut h = single();
        h.controller.handle(AppEvent::WindowStateChanged).await;
        h.controller.games.set(Some(GameInfo::running(VALORANT_CLASS_ID)));

        let timer = h.events.recv().await.unwrap();
        assert_eq!(h.controller.handle(timer).await, Flow::Continue);
    }

    #[tokio::test(start_paused = true)]
    async fn no_timer_while_game_runs() {
        let mut h = single();
        h.controller.games.set(Some(GameInfo::running(VALORANT_CLASS_ID)));
        h.controller.handle(AppEvent::WindowStateChanged).await;

        let fired = tokio::time::timeout(Duration::from_secs(60), h.events.recv()).await;
        assert!(fired.is_err());
    }

    #[tokio::test]
    async fn stale_timer_is_ignored() {
        let mut h = single();
        assert_eq!(h.controller.handle(AppEvent::ShutdownTimerElapsed(7)).await, Flow::Continue);
    }

    #[tokio::test]
    async fn ctrl_c_exits_and_config_reload_applies() {
        let mut h = single();
        let mut config = Config::default();
        config.games.clear();
        assert_eq!(h.controller.handle(AppEvent::ConfigReloaded(config)).await, Flow::Continue);
        assert!(h.controller.config.read().await.game(VALORANT_CLASS_ID).is_none());

        assert_eq!(h.controller.handle(AppEvent::Shutdown).await, Flow::Exit);
    }
}
