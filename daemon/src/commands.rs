/// Hotkey commands mapped onto explicit surface transitions.
///
/// Both commands read the registry fresh on every press.
use anyhow::Result;

use crate::hotkey::HotkeyCommand;
use crate::surfaces::{is_open, SurfaceName, SurfaceRegistry};

pub async fn run<S: SurfaceRegistry>(command: HotkeyCommand, surfaces: &S) -> Result<()> {
    match command {
        HotkeyCommand::Toggle => toggle(surfaces).await,
        HotkeyCommand::SecondScreen => toggle_second_screen(surfaces).await,
    }
}

/// Closes the second screen if it is open; otherwise flips the in-game overlay.
/// Never opens the second screen.
pub async fn toggle<S: SurfaceRegistry>(surfaces: &S) -> Result<()> {
    let states = surfaces.states().await?;

    if is_open(&states, SurfaceName::SecondScreen) {
        return surfaces.close(SurfaceName::SecondScreen).await;
    }

    if is_open(&states, SurfaceName::InGame) {
        surfaces.close(SurfaceName::InGame).await
    } else {
        surfaces.restore(SurfaceName::InGame).await
    }
}

/// Swaps between the second screen and the in-game overlay. At most one of
/// the two is open afterwards.
pub async fn toggle_second_screen<S: SurfaceRegistry>(surfaces: &S) -> Result<()> {
    let states = surfaces.states().await?;

    if is_open(&states, SurfaceName::SecondScreen) {
        surfaces.close(SurfaceName::SecondScreen).await?;
        surfaces.restore(SurfaceName::InGame).await
    } else {
        surfaces.restore(SurfaceName::SecondScreen).await?;
        surfaces.close(SurfaceName::InGame).await
    }
}
