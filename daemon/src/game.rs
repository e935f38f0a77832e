/// Running-game snapshot as reported by the game state provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameInfo {
    pub is_running: bool,
    pub class_id: Option<u32>,
}

impl GameInfo {
    pub fn running(class_id: u32) -> Self {
        Self {
            is_running: true,
            class_id: Some(class_id),
        }
    }
}

/// Tells the daemon whether a game is running and which one.
///
/// Answers are point-in-time snapshots; callers query again rather than keep them.
pub trait GameStateProvider {
    async fn running_game_info(&self) -> Option<GameInfo>;
    async fn is_game_running(&self) -> bool;
}
