mod bridge;
mod bus;
mod commands;
mod config;
mod controller;
mod display;
mod event;
mod game;
mod hotkey;
mod logging;
mod paths;
mod process_monitor;
mod router;
mod shutdown;
mod sink;
mod status;
mod surfaces;
mod telemetry;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use crate::controller::{Controller, Flow, Services};
use crate::event::{AppEvent, LaunchSource};

#[tokio::main]
async fn main() {
    logging::init();

    // ── App data directory ────────────────────────────────────────────────────
    let app_dir = match paths::app_data_dir() {
        Ok(dir) => dir,
        Err(e) => {
            tracing::error!("{e:#}");
            std::process::exit(1);
        }
    };
    if let Err(e) = std::fs::create_dir_all(&app_dir) {
        tracing::error!("Failed to create app data directory {}: {e}", app_dir.display());
        std::process::exit(1);
    }

    // ── Configuration ─────────────────────────────────────────────────────────
    let config_path = paths::config_file_path(&app_dir);
    let initial_config = config::load_or_default(&config_path).unwrap_or_else(|e| {
        tracing::error!(target: "config", "{e:#} (using defaults)");
        config::Config::default()
    });
    let launch_source = LaunchSource::from_args(std::env::args().skip(1));
    let monitors = display::MonitorConfig::detect(initial_config.global.multiple_monitors);
    let sink_endpoint = initial_config.global.sink_endpoint.clone();
    let toggle_hotkey = initial_config.global.toggle_hotkey.clone();
    let second_screen_hotkey = initial_config.global.second_screen_hotkey.clone();
    let shared_config = Arc::new(RwLock::new(initial_config));

    let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(64);

    // ── Shared state and collaborators ────────────────────────────────────────
    let shared = Arc::new(bus::SharedState::new());
    let surfaces = surfaces::LocalSurfaces::new(Some(paths::status_file_path(&app_dir)));
    let surface_changes = surfaces.clone();
    let feed = bridge::HostFeed::new();
    let games = process_monitor::ProcessGameState::new(Arc::clone(&shared_config));
    let (sink, sink_rx) = sink::SinkHandle::channel();

    // ── Background tasks ──────────────────────────────────────────────────────
    tokio::spawn(config::watch_config(config_path, event_tx.clone()));
    tokio::spawn(sink::run(sink_endpoint, sink_rx));
    tokio::spawn(bus::trace_messages(shared.bus.subscribe_all()));

    if let Err(e) = bridge::start(feed.clone(), surfaces.clone(), event_tx.clone()) {
        tracing::error!(target: "bridge", "Failed to start host listener: {e}");
    }

    let hotkey_handle = match hotkey::start(&toggle_hotkey, &second_screen_hotkey, event_tx.clone()) {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::error!(target: "hotkey", "{e:#}");
            None
        }
    };

    // Graceful shutdown on Ctrl+C.
    {
        let tx = event_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(AppEvent::Shutdown).await;
            }
        });
    }

    tracing::info!("overlay-daemon v{} started", env!("CARGO_PKG_VERSION"));

    let mut controller = Controller::new(
        Services {
            surfaces,
            games,
            features: feed,
        },
        Arc::clone(&shared_config),
        monitors,
        launch_source,
        Arc::clone(&shared),
        sink,
        event_tx.clone(),
    );

    controller.restore_launch_window().await;

    // Start watching only after the launch decision so an early start event
    // cannot race it.
    tokio::spawn(process_monitor::run(Arc::clone(&shared_config), event_tx));

    // ── Event loop ────────────────────────────────────────────────────────────
    loop {
        let evt = tokio::select! {
            evt = event_rx.recv() => match evt {
                Some(evt) => evt,
                None => break,
            },
            () = surface_changes.changed() => AppEvent::WindowStateChanged,
        };

        if let (AppEvent::ConfigReloaded(new_config), Some(handle)) = (&evt, &hotkey_handle) {
            handle.update_bindings(
                &new_config.global.toggle_hotkey,
                &new_config.global.second_screen_hotkey,
            );
        }

        if controller.handle(evt).await == Flow::Exit {
            break;
        }
    }

    if let Some(handle) = hotkey_handle {
        handle.stop();
    }
    match shared.events.last() {
        Some(last) => tracing::info!(
            "Session held {} events and {} info updates (last: '{}' at {})",
            shared.events.len(),
            shared.info.len(),
            last.value.name,
            last.received_at.to_rfc3339()
        ),
        None => tracing::info!("Session held no events ({} info updates)", shared.info.len()),
    }
    tracing::info!("Stopped");
}
