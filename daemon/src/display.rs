/// Monitor layout, read once at startup.
///
/// Decides whether the game surface is the in-game overlay or the
/// second-screen window for the whole life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub has_multiple_monitors: bool,
}

impl MonitorConfig {
    /// Uses the config override when set, otherwise asks the OS.
    pub fn detect(override_multiple: Option<bool>) -> Self {
        let has_multiple_monitors = override_multiple.unwrap_or_else(|| monitor_count() > 1);
        tracing::info!(target: "display", "Multiple monitors: {has_multiple_monitors}");
        Self { has_multiple_monitors }
    }
}

#[cfg(windows)]
fn monitor_count() -> u32 {
    use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CMONITORS};
    let count = unsafe { GetSystemMetrics(SM_CMONITORS) };
    u32::try_from(count).unwrap_or(1)
}

#[cfg(not(windows))]
fn monitor_count() -> u32 {
    1
}
