use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::game::{Game, LevelProgress};
use crate::session::LEVELS_PER_SESSION;

/// The level a player is on, plus that level's in-flight progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveGame {
    pub session_id: String,
    pub current_level: u8,
    #[serde(default, deserialize_with = "lenient_progress")]
    pub level_progress: Option<LevelProgress>,
}

// An unreadable snapshot must not take the session pointer down with it.
fn lenient_progress<'de, D>(deserializer: D) -> Result<Option<LevelProgress>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match serde_json::from_value(v) {
        Ok(progress) => Some(progress),
        Err(e) => {
            warn!("discarding malformed level progress: {e}");
            None
        }
    }))
}

impl ActiveGame {
    /// Fresh pointer at `level` of `session_id`.
    pub fn new(session_id: impl Into<String>, level: u8) -> Self {
        Self {
            session_id: session_id.into(),
            current_level: level,
            level_progress: Some(LevelProgress::default()),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.session_id.is_empty() && (1..=LEVELS_PER_SESSION as u8).contains(&self.current_level)
    }

    pub fn update_progress(&mut self, game: &Game) {
        self.level_progress = Some(game.snapshot());
    }

    pub fn retry(&mut self) {
        self.level_progress = Some(LevelProgress::default());
    }

    /// Advance to the following level. Returns false on the final level.
    pub fn next_level(&mut self) -> bool {
        if self.current_level as usize >= LEVELS_PER_SESSION {
            return false;
        }
        self.current_level += 1;
        self.level_progress = Some(LevelProgress::default());
        true
    }

    pub fn restart_session(&mut self) {
        self.current_level = 1;
        self.level_progress = Some(LevelProgress::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameStatus;

    #[test]
    fn next_level_stops_at_final() {
        let mut active = ActiveGame::new("session-1", 2);
        assert!(active.next_level());
        assert_eq!(active.current_level, 3);
        assert!(!active.next_level());
        assert_eq!(active.current_level, 3);

        active.restart_session();
        assert_eq!(active.current_level, 1);
    }

    #[test]
    fn retry_clears_progress() {
        let mut game = Game::new("CRANE");
        for c in "SLATE".chars() {
            game.append_letter(c);
        }
        game.submit_guess().unwrap();

        let mut active = ActiveGame::new("session-1", 1);
        active.update_progress(&game);
        assert_eq!(active.level_progress.as_ref().unwrap().guesses.len(), 1);

        active.retry();
        assert_eq!(active.level_progress, Some(LevelProgress::default()));
    }

    #[test]
    fn validity_bounds() {
        assert!(ActiveGame::new("session-1", 3).is_valid());
        assert!(!ActiveGame::new("session-1", 0).is_valid());
        assert!(!ActiveGame::new("session-1", 4).is_valid());
        assert!(!ActiveGame::new("", 1).is_valid());
    }

    #[test]
    fn malformed_progress_is_dropped_not_fatal() {
        let json = r#"{
            "sessionId": "session-2",
            "currentLevel": 2,
            "levelProgress": { "guesses": "nope", "currentRow": -1, "gameStatus": "paused" }
        }"#;
        let active: ActiveGame = serde_json::from_str(json).unwrap();
        assert_eq!(active.session_id, "session-2");
        assert_eq!(active.current_level, 2);
        assert_eq!(active.level_progress, None);
    }

    #[test]
    fn legacy_progress_without_current_guess_loads() {
        let json = r#"{
            "sessionId": "session-1",
            "currentLevel": 1,
            "levelProgress": { "guesses": [], "currentRow": 0, "gameStatus": "playing" }
        }"#;
        let active: ActiveGame = serde_json::from_str(json).unwrap();
        let progress = active.level_progress.unwrap();
        assert_eq!(progress.game_status, GameStatus::Playing);
        assert_eq!(progress.current_guess, "");
    }
}
