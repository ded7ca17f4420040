use tracing::{debug, error, info, warn};

use crate::active_game::ActiveGame;
use crate::error::{AdminError, StoreError};
use crate::game::{Game, LevelOutcome};
use crate::session::{default_catalog, parse_session_id, validate_session_config, Level, Session, Sessions};
use crate::stats::Stats;
use crate::store::{read_record, write_record, KeyValueStore};

pub const SESSION_DATA_KEY: &str = "sessionData";
pub const CURRENT_SESSION_KEY: &str = "currentSession";
pub const STATS_KEY: &str = "wordleStats";

/// Target used when a level has no word configured.
pub const FALLBACK_WORD: &str = "CRANE";

/// Typed access to sessions, the active game and aggregate stats.
///
/// Reads never fail: unavailable or corrupt data is logged and reported as
/// absent. Writes return the error so callers can log it and carry on. Every
/// mutation is a read-modify-write of a whole record, so two processes sharing
/// a store race with last-writer-wins.
#[derive(Debug)]
pub struct ProgressStore<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> ProgressStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    fn read<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        match read_record(&self.store, key) {
            Ok(value) => value,
            Err(e) => {
                error!("error loading {key}: {e}");
                None
            }
        }
    }

    pub fn load_sessions(&self) -> Option<Sessions> {
        self.read(SESSION_DATA_KEY)
    }

    pub fn save_sessions(&mut self, sessions: &Sessions) -> Result<(), StoreError> {
        write_record(&mut self.store, SESSION_DATA_KEY, sessions)
    }

    pub fn load_session(&self, session_id: &str) -> Option<Session> {
        let session = self.load_sessions()?.remove(session_id);
        if session.is_none() {
            warn!("session not found: {session_id}");
        }
        session
    }

    /// Target word for a level, falling back to a fixed word when missing.
    pub fn level_word(&self, session_id: &str, level_number: u8) -> String {
        self.load_session(session_id)
            .and_then(|s| s.level(level_number).map(|l| l.word.to_uppercase()))
            .filter(|w| !w.is_empty())
            .unwrap_or_else(|| {
                error!("no word for {session_id} level {level_number}, using fallback");
                FALLBACK_WORD.to_string()
            })
    }

    pub fn load_stats(&self) -> Stats {
        self.read(STATS_KEY).unwrap_or_default()
    }

    pub fn save_stats(&mut self, stats: &Stats) -> Result<(), StoreError> {
        write_record(&mut self.store, STATS_KEY, stats)
    }

    pub fn reset_stats(&mut self) -> Result<(), StoreError> {
        info!("clearing aggregate stats");
        self.store.remove(STATS_KEY)
    }

    pub fn load_active_game(&self) -> Option<ActiveGame> {
        let active: ActiveGame = self.read(CURRENT_SESSION_KEY)?;
        if active.is_valid() {
            Some(active)
        } else {
            warn!("invalid current session record, ignoring");
            None
        }
    }

    pub fn save_active_game(&mut self, active: &ActiveGame) -> Result<(), StoreError> {
        write_record(&mut self.store, CURRENT_SESSION_KEY, active)
    }

    pub fn clear_active_game(&mut self) -> Result<(), StoreError> {
        self.store.remove(CURRENT_SESSION_KEY)
    }

    /// Store `game` as the progress of the active level.
    pub fn save_game(&mut self, session_id: &str, level: u8, game: &Game) -> Result<(), StoreError> {
        let mut active = self
            .load_active_game()
            .filter(|a| a.session_id == session_id && a.current_level == level)
            .unwrap_or_else(|| ActiveGame::new(session_id, level));
        active.update_progress(game);
        self.save_active_game(&active)?;
        debug!(session_id, level, "game saved");
        Ok(())
    }

    /// Count a finished attempt against a level. Returns the updated level,
    /// or `None` when the session or level does not exist.
    pub fn record_level_attempt(
        &mut self,
        session_id: &str,
        level_number: u8,
        won: bool,
        guess_count: u32,
    ) -> Result<Option<Level>, StoreError> {
        let Some(mut sessions) = self.load_sessions() else {
            return Ok(None);
        };
        let Some(level) = sessions
            .get_mut(session_id)
            .and_then(|s| s.level_mut(level_number))
        else {
            warn!("cannot record attempt for missing {session_id} level {level_number}");
            return Ok(None);
        };

        level.record_attempt(won, guess_count);
        let updated = level.clone();
        self.save_sessions(&sessions)?;
        debug!(?updated, "level completion updated");
        Ok(Some(updated))
    }

    /// Hand a terminal result to both the level record and the aggregate stats.
    /// Stats are written even when the level record fails; that failure is
    /// still returned.
    pub fn complete_level(
        &mut self,
        session_id: &str,
        level_number: u8,
        outcome: LevelOutcome,
    ) -> Result<(Option<Level>, Stats), StoreError> {
        let level = self.record_level_attempt(session_id, level_number, outcome.won, outcome.guess_count);
        if let Err(e) = &level {
            error!(session_id, level_number, "could not record level attempt: {e}");
        }
        let mut stats = self.load_stats();
        stats.record_game(outcome.won, outcome.guess_count);
        self.save_stats(&stats)?;
        Ok((level?, stats))
    }

    pub fn reset_level(&mut self, session_id: &str, level_number: u8) -> Result<bool, StoreError> {
        let Some(mut sessions) = self.load_sessions() else {
            return Ok(false);
        };
        let Some(level) = sessions
            .get_mut(session_id)
            .and_then(|s| s.level_mut(level_number))
        else {
            return Ok(false);
        };
        level.reset_progress();
        self.save_sessions(&sessions)?;
        info!(session_id, level_number, "level progress reset");
        Ok(true)
    }

    /// Zero every level of a session. When the active game points at this
    /// session it is rewound to a fresh level 1.
    pub fn reset_session(&mut self, session_id: &str) -> Result<bool, StoreError> {
        let Some(mut sessions) = self.load_sessions() else {
            return Ok(false);
        };
        let Some(session) = sessions.get_mut(session_id) else {
            return Ok(false);
        };
        session.reset_progress();
        self.save_sessions(&sessions)?;

        if let Some(mut active) = self.load_active_game().filter(|a| a.session_id == session_id) {
            active.restart_session();
            self.save_active_game(&active)?;
        }
        info!(session_id, "session progress reset");
        Ok(true)
    }

    pub fn clear_sessions(&mut self) -> Result<(), StoreError> {
        self.store.remove(SESSION_DATA_KEY)?;
        self.store.remove(CURRENT_SESSION_KEY)?;
        info!("all sessions cleared");
        Ok(())
    }

    /// Write the built-in catalog, keeping progress of matching sessions and
    /// level positions. Sessions outside the catalog are dropped.
    pub fn create_default_sessions(&mut self) -> Result<Sessions, StoreError> {
        let mut catalog = default_catalog();
        if let Some(existing) = self.load_sessions() {
            for (id, session) in catalog.iter_mut() {
                if let Some(previous) = existing.get(id) {
                    session.merge_progress_from(previous);
                }
            }
        }
        self.save_sessions(&catalog)?;
        info!(count = catalog.len(), "default sessions created");
        Ok(catalog)
    }

    /// Seed the catalog on first launch; existing data is left alone.
    pub fn seed_if_empty(&mut self) -> Result<Sessions, StoreError> {
        match self.load_sessions() {
            Some(sessions) if !sessions.is_empty() => Ok(sessions),
            _ => {
                info!("no sessions found, seeding defaults");
                self.create_default_sessions()
            }
        }
    }

    /// Create or rewrite one session's name and words, keeping its progress.
    pub fn save_session_config(
        &mut self,
        session_id: &str,
        name: &str,
        word1: &str,
        word2: &str,
        word3: &str,
    ) -> Result<Session, AdminError> {
        let id = parse_session_id(session_id)
            .map_err(|_| AdminError::InvalidSessionId(session_id.trim().to_string()))?;
        let validation = validate_session_config(name, word1, word2, word3);
        if !validation.valid() {
            return Err(AdminError::Invalid(validation));
        }

        let mut sessions = self.load_sessions().unwrap_or_default();
        let session = sessions
            .entry(id.clone())
            .and_modify(|s| s.reconfigure(&validation.name, validation.word_refs()))
            .or_insert_with(|| Session::new(&id, validation.name.clone(), validation.word_refs()))
            .clone();
        self.save_sessions(&sessions)?;
        info!(session_id = %id, "session saved");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameStatus, LevelProgress};
    use crate::store::MemoryStore;
    use assert_matches::assert_matches;

    fn seeded() -> ProgressStore<MemoryStore> {
        let mut store = ProgressStore::new(MemoryStore::new());
        store.create_default_sessions().unwrap();
        store
    }

    #[test]
    fn loads_are_absent_on_empty_store() {
        let store = ProgressStore::new(MemoryStore::new());
        assert_eq!(store.load_sessions(), None);
        assert_eq!(store.load_active_game(), None);
        assert_eq!(store.load_stats(), Stats::default());
    }

    #[test]
    fn corrupt_records_read_as_absent() {
        let mut raw = MemoryStore::new();
        raw.set(SESSION_DATA_KEY, "{{{").unwrap();
        raw.set(STATS_KEY, "[1,2]").unwrap();
        raw.set(CURRENT_SESSION_KEY, r#"{"sessionId": "", "currentLevel": 1}"#).unwrap();
        let store = ProgressStore::new(raw);
        assert_eq!(store.load_sessions(), None);
        assert_eq!(store.load_stats(), Stats::default());
        assert_eq!(store.load_active_game(), None);
    }

    #[test]
    fn record_attempt_updates_level() {
        let mut store = seeded();
        store.record_level_attempt("session-1", 1, false, 6).unwrap();
        store.record_level_attempt("session-1", 1, true, 4).unwrap();
        let level = store.record_level_attempt("session-1", 1, true, 2).unwrap().unwrap();
        assert_eq!(level.attempts, 3);
        assert!(level.completed);
        assert_eq!(level.best_score, Some(2));

        let reloaded = store.load_session("session-1").unwrap();
        assert_eq!(reloaded.levels[0], level);
    }

    #[test]
    fn record_attempt_on_unknown_target_is_noop() {
        let mut store = seeded();
        assert_eq!(store.record_level_attempt("session-9", 1, true, 1).unwrap(), None);
        assert_eq!(store.record_level_attempt("session-1", 4, true, 1).unwrap(), None);
        let mut empty = ProgressStore::new(MemoryStore::new());
        assert_eq!(empty.record_level_attempt("session-1", 1, true, 1).unwrap(), None);
    }

    #[test]
    fn defaults_preserve_existing_progress() {
        let mut store = seeded();
        store.record_level_attempt("session-1", 1, true, 2).unwrap();

        let sessions = store.create_default_sessions().unwrap();
        let level = &sessions["session-1"].levels[0];
        assert!(level.completed);
        assert_eq!(level.best_score, Some(2));
        assert_eq!(level.attempts, 1);
        assert_eq!(store.load_session("session-1").unwrap().levels[0], *level);
    }

    #[test]
    fn defaults_restore_catalog_words() {
        let mut store = seeded();
        store
            .save_session_config("session-2", "Custom", "apple", "mango", "grape")
            .unwrap();
        store.record_level_attempt("session-2", 2, true, 5).unwrap();

        let sessions = store.create_default_sessions().unwrap();
        let session = &sessions["session-2"];
        assert_eq!(session.session_name, "Intermediate Quest");
        assert_eq!(session.levels[1].word, "WORLD");
        assert_eq!(session.levels[1].best_score, Some(5));
    }

    #[test]
    fn reset_level_and_session() {
        let mut store = seeded();
        store.record_level_attempt("session-3", 1, true, 3).unwrap();
        store.record_level_attempt("session-3", 2, true, 4).unwrap();

        assert!(store.reset_level("session-3", 1).unwrap());
        let session = store.load_session("session-3").unwrap();
        assert_eq!(session.levels[0], Level::new(1, "BRAVE"));
        assert!(session.levels[1].completed);

        store.save_active_game(&ActiveGame::new("session-3", 3)).unwrap();
        assert!(store.reset_session("session-3").unwrap());
        let session = store.load_session("session-3").unwrap();
        assert!(session.levels.iter().all(|l| !l.completed && l.attempts == 0 && l.best_score.is_none()));
        assert_eq!(session.levels[2].word, "FROST");
        assert_eq!(store.load_active_game().unwrap().current_level, 1);

        assert!(!store.reset_session("session-42").unwrap());
    }

    #[test]
    fn reset_session_leaves_other_active_game_alone() {
        let mut store = seeded();
        store.save_active_game(&ActiveGame::new("session-1", 2)).unwrap();
        store.reset_session("session-2").unwrap();
        assert_eq!(store.load_active_game().unwrap().current_level, 2);
    }

    #[test]
    fn clear_removes_sessions_and_active_game() {
        let mut store = seeded();
        store.save_active_game(&ActiveGame::new("session-1", 1)).unwrap();
        store.clear_sessions().unwrap();
        assert_eq!(store.load_sessions(), None);
        assert_eq!(store.load_active_game(), None);
    }

    #[test]
    fn seed_if_empty_only_seeds_once() {
        let mut store = ProgressStore::new(MemoryStore::new());
        assert_eq!(store.seed_if_empty().unwrap().len(), 5);
        store
            .save_session_config("session-1", "Mine", "ABCDE", "FGHIJ", "KLMNO")
            .unwrap();
        let sessions = store.seed_if_empty().unwrap();
        assert_eq!(sessions["session-1"].session_name, "Mine");
    }

    #[test]
    fn save_session_config_validates_and_keeps_progress() {
        let mut store = seeded();
        store.record_level_attempt("session-1", 3, true, 6).unwrap();

        let err = store
            .save_session_config("session-1", "", "HELLO", "HELLO", "WOR")
            .unwrap_err();
        assert_matches!(err, AdminError::Invalid(ref v) if v.errors.len() == 3);

        let session = store
            .save_session_config("session-1", "Renamed", "lemon", "peach", "melon")
            .unwrap();
        assert_eq!(session.session_name, "Renamed");
        assert_eq!(session.levels[2].word, "MELON");
        assert_eq!(session.levels[2].best_score, Some(6));

        let created = store
            .save_session_config("session-6", "Bonus", "ocean", "river", "creek")
            .unwrap();
        assert_eq!(created.levels.len(), 3);
        assert!(store.load_session("session-6").is_some());
    }

    /// Memory store that refuses writes to one key.
    struct RejectWrites {
        inner: MemoryStore,
        key: &'static str,
    }

    impl KeyValueStore for RejectWrites {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
            if key == self.key {
                return Err(std::io::Error::other("disk full").into());
            }
            self.inner.set(key, value)
        }

        fn remove(&mut self, key: &str) -> Result<(), StoreError> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn stats_survive_a_failed_level_write() {
        let inner = seeded().into_inner();
        let mut store = ProgressStore::new(RejectWrites {
            inner,
            key: SESSION_DATA_KEY,
        });

        let result = store.complete_level("session-1", 1, LevelOutcome { won: true, guess_count: 4 });
        assert_matches!(result, Err(StoreError::Io(_)));
        let stats = store.load_stats();
        assert_eq!(stats.games_played, 1);
        assert_eq!(stats.guess_distribution[3], 1);
        assert!(!store.load_session("session-1").unwrap().levels[0].completed);
    }

    #[test]
    fn save_session_config_rejects_unplayable_ids() {
        let mut store = seeded();
        for id in ["bonus", "session-07", "session-"] {
            let err = store
                .save_session_config(id, "Bonus", "ocean", "river", "creek")
                .unwrap_err();
            assert_matches!(err, AdminError::InvalidSessionId(ref bad) if bad == id);
        }
        assert_eq!(store.load_sessions().unwrap().len(), 5);

        let saved = store
            .save_session_config(" Session-6 ", "Bonus", "ocean", "river", "creek")
            .unwrap();
        assert_eq!(saved.session_id, "session-6");
        assert!(store.load_session("session-6").is_some());
    }

    #[test]
    fn complete_level_updates_stats_too() {
        let mut store = seeded();
        let (level, stats) = store
            .complete_level("session-1", 1, LevelOutcome { won: true, guess_count: 3 })
            .unwrap();
        assert_eq!(level.unwrap().best_score, Some(3));
        assert_eq!(stats.games_won, 1);
        assert_eq!(stats.guess_distribution[2], 1);

        let (_, stats) = store
            .complete_level("session-1", 2, LevelOutcome { won: false, guess_count: 6 })
            .unwrap();
        assert_eq!(stats.games_played, 2);
        assert_eq!(stats.current_streak, 0);
        assert_eq!(store.load_stats(), stats);

        store.reset_stats().unwrap();
        assert_eq!(store.load_stats(), Stats::default());
    }

    #[test]
    fn save_game_round_trips_progress() {
        let mut store = seeded();
        let mut game = Game::new(store.level_word("session-1", 2));
        for c in "CRANE".chars() {
            game.append_letter(c);
        }
        game.submit_guess().unwrap();
        store.save_game("session-1", 2, &game).unwrap();

        let active = store.load_active_game().unwrap();
        assert_eq!(active.session_id, "session-1");
        assert_eq!(active.current_level, 2);
        let progress: LevelProgress = active.level_progress.unwrap();
        assert_eq!(progress.guesses, vec!["CRANE".to_string()]);
        assert_eq!(progress.game_status, GameStatus::Playing);
        assert!(progress.saved_at.is_some());
    }

    #[test]
    fn level_word_falls_back() {
        let store = seeded();
        assert_eq!(store.level_word("session-2", 3), "PLANT");
        assert_eq!(store.level_word("session-2", 9), FALLBACK_WORD);
        assert_eq!(store.level_word("nope", 1), FALLBACK_WORD);
    }
}
