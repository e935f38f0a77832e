use crate::config::Config;
use crate::hotkey::HotkeyCommand;
use crate::telemetry::{InfoSnapshot, TelemetryEvent};

/// Messages drained by the single event loop in `main`, in arrival order.
#[derive(Debug)]
pub enum AppEvent {
    /// The game state provider saw a supported game start (`true`) or exit (`false`).
    GameRunningChanged(bool),
    /// The app was launched again while already running.
    LaunchTriggered(LaunchSource),
    /// Some surface changed state. Produced from the registry's coalescing
    /// change signal; handlers re-query the registry.
    WindowStateChanged,
    /// One of the two overlay hotkeys was pressed.
    Hotkey(HotkeyCommand),
    /// A batch of discrete game events from the feature stream.
    GameEvents(Vec<TelemetryEvent>),
    /// A periodic info snapshot from the feature stream.
    InfoUpdate(InfoSnapshot),
    /// The shutdown debounce timer with the given generation elapsed.
    ShutdownTimerElapsed(u64),
    /// The config file changed on disk and was successfully re-parsed.
    ConfigReloaded(Config),
    /// Ctrl+C received; the daemon should exit.
    Shutdown,
}

/// Where an app-launch trigger came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchSource {
    /// Launched automatically because a game was detected starting.
    GameLaunchEvent,
    /// Launched by the user or the system (shortcut, tray, dock, ...).
    User,
}

impl LaunchSource {
    pub const GAME_LAUNCH_MARKER: &'static str = "gamelaunchevent";

    /// Maps an optional origin marker to a launch source. Anything other than
    /// the game-launch marker counts as a user launch.
    pub fn from_marker(marker: Option<&str>) -> Self {
        match marker {
            Some(m) if m.eq_ignore_ascii_case(Self::GAME_LAUNCH_MARKER) => {
                LaunchSource::GameLaunchEvent
            }
            _ => LaunchSource::User,
        }
    }

    /// Reads the launch source from the process arguments
    /// (`--source=gamelaunchevent` or `--source gamelaunchevent`).
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let arg = arg.as_ref();
            if let Some(value) = arg.strip_prefix("--source=") {
                return Self::from_marker(Some(value));
            }
            if arg == "--source" {
                let next = args.next();
                return Self::from_marker(next.as_ref().map(|s| s.as_ref()));
            }
        }
        LaunchSource::User
    }
}
