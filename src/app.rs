use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{backend::Backend, Terminal};
use std::io;
use tracing::{debug, error, info};

use crate::active_game::ActiveGame;
use crate::game::{Game, GameEvent, GameInput, GameStatus, LevelOutcome};
use crate::progress::ProgressStore;
use crate::progression::{find_next_available_level, is_level_unlocked, is_session_complete};
use crate::runtime::{AppEvent, EventSource, Runner, Ticker};
use crate::session::{normalize_session_id, Session, SessionIdError};
use crate::stats::Stats;
use crate::store::KeyValueStore;

/// How long a status message stays up, in ticks.
pub const MESSAGE_TICKS: u16 = 20;
const MAX_SESSION_INPUT: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    SessionSelect,
    LevelSelect,
    Playing,
    SessionComplete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    ticks_left: u16,
}

/// Screen flow of the terminal game on top of a [`ProgressStore`].
#[derive(Debug)]
pub struct App<S: KeyValueStore> {
    store: ProgressStore<S>,
    screen: Screen,
    session_input: String,
    session: Option<Session>,
    selected_level: u8,
    current_level: u8,
    game: Option<Game>,
    stats: Stats,
    message: Option<Message>,
    reveal_target: bool,
    should_quit: bool,
}

impl<S: KeyValueStore> App<S> {
    pub fn new(mut store: ProgressStore<S>, reveal_target: bool) -> Self {
        if let Err(e) = store.seed_if_empty() {
            error!("could not seed sessions: {e}");
        }
        let stats = store.load_stats();
        Self {
            store,
            screen: Screen::SessionSelect,
            session_input: String::new(),
            session: None,
            selected_level: 1,
            current_level: 1,
            game: None,
            stats,
            message: None,
            reveal_target,
            should_quit: false,
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.session_id.as_str())
    }

    pub fn session_input(&self) -> &str {
        &self.session_input
    }

    pub fn selected_level(&self) -> u8 {
        self.selected_level
    }

    pub fn current_level(&self) -> u8 {
        self.current_level
    }

    pub fn game(&self) -> Option<&Game> {
        self.game.as_ref()
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_ref().map(|m| m.text.as_str())
    }

    pub fn reveal_target(&self) -> bool {
        self.reveal_target
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn store(&self) -> &ProgressStore<S> {
        &self.store
    }

    pub fn into_store(self) -> ProgressStore<S> {
        self.store
    }

    /// Pre-fill the session prompt, e.g. with the last session played.
    pub fn set_session_input(&mut self, input: &str) {
        self.session_input = input.chars().take(MAX_SESSION_INPUT).collect();
    }

    fn flash(&mut self, text: impl Into<String>) {
        self.message = Some(Message {
            text: text.into(),
            ticks_left: MESSAGE_TICKS,
        });
    }

    /// Pick up the stored game if one is mid-level. Returns true when the
    /// app went straight to the board.
    pub fn resume(&mut self) -> bool {
        let Some(active) = self.store.load_active_game() else {
            return false;
        };
        let Some(session) = self.store.load_session(&active.session_id) else {
            return false;
        };
        let Some(progress) = active.level_progress.filter(|p| !p.guesses.is_empty() || !p.current_guess.is_empty())
        else {
            return false;
        };

        let word = self.store.level_word(&session.session_id, active.current_level);
        self.session_input = session.session_id.clone();
        self.selected_level = active.current_level;
        self.current_level = active.current_level;
        self.session = Some(session);
        self.game = Some(Game::resume_or_new(word, Some(progress)));
        self.screen = Screen::Playing;
        info!(session_id = %active.session_id, level = active.current_level, "resumed game");
        true
    }

    /// Validate typed input and move to that session's level list.
    pub fn select_session(&mut self, input: &str) -> Result<(), SessionIdError> {
        let sessions = self.store.load_sessions();
        let id = normalize_session_id(input, sessions.as_ref())?;
        let Some(session) = sessions.and_then(|mut s| s.remove(&id)) else {
            return Err(SessionIdError::NotFound);
        };

        if let Err(e) = self.store.save_active_game(&ActiveGame::new(&id, 1)) {
            error!("could not save current session: {e}");
        }
        self.selected_level = find_next_available_level(&session).unwrap_or(1);
        self.session_input = id.clone();
        self.session = Some(session);
        self.game = None;
        self.screen = Screen::LevelSelect;
        info!(session_id = %id, "session selected");
        Ok(())
    }

    fn refresh_session(&mut self) {
        if let Some(id) = self.session_id().map(str::to_string) {
            if let Some(session) = self.store.load_session(&id) {
                self.session = Some(session);
            }
        }
    }

    /// Start a fresh round of `level`. Locked levels only produce a message.
    pub fn start_level(&mut self, level: u8) -> bool {
        let Some(session) = self.session.as_ref() else {
            return false;
        };
        if !is_level_unlocked(level, session) {
            self.flash("COMPLETE PREVIOUS LEVEL FIRST!");
            return false;
        }

        let session_id = session.session_id.clone();
        let word = self.store.level_word(&session_id, level);
        if let Err(e) = self.store.save_active_game(&ActiveGame::new(&session_id, level)) {
            error!("could not save current session: {e}");
        }
        self.current_level = level;
        self.selected_level = level;
        self.game = Some(Game::new(word));
        self.screen = Screen::Playing;
        debug!(session_id = %session_id, level, "level started");
        true
    }

    fn back_to_levels(&mut self) {
        self.refresh_session();
        self.game = None;
        self.screen = Screen::LevelSelect;
    }

    pub fn retry_level(&mut self) {
        let level = self.current_level;
        self.start_level(level);
    }

    /// Advance after a win. At the final level this returns to the level list.
    pub fn next_level(&mut self) {
        let has_next = self
            .session
            .as_ref()
            .is_some_and(|s| s.level(self.current_level + 1).is_some());
        if has_next {
            let next = self.current_level + 1;
            self.start_level(next);
        } else {
            self.back_to_levels();
        }
    }

    pub fn replay_session(&mut self) {
        let Some(id) = self.session_id().map(str::to_string) else {
            return;
        };
        if let Err(e) = self.store.reset_session(&id) {
            error!("could not reset session {id}: {e}");
        }
        self.back_to_levels();
        self.selected_level = 1;
    }

    fn reset_stats(&mut self) {
        match self.store.reset_stats() {
            Ok(()) => {
                self.stats = Stats::default();
                self.flash("STATS CLEARED");
            }
            Err(e) => error!("could not clear stats: {e}"),
        }
    }

    pub fn on_tick(&mut self) {
        if let Some(message) = self.message.as_mut() {
            message.ticks_left = message.ticks_left.saturating_sub(1);
            if message.ticks_left == 0 {
                self.message = None;
            }
        }
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        match self.screen {
            Screen::SessionSelect => self.on_session_key(key),
            Screen::LevelSelect => self.on_level_key(key),
            Screen::Playing => self.on_game_key(key),
            Screen::SessionComplete => match key.code {
                KeyCode::Enter => self.back_to_levels(),
                KeyCode::Char('r') | KeyCode::Char('R') => self.replay_session(),
                KeyCode::Esc => self.screen = Screen::SessionSelect,
                _ => {}
            },
        }
    }

    fn on_session_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Backspace => {
                self.session_input.pop();
            }
            KeyCode::Enter => {
                let input = self.session_input.clone();
                if let Err(e) = self.select_session(&input) {
                    self.flash(e.to_string());
                }
            }
            KeyCode::Char(c) if (c.is_ascii_alphanumeric() || c == '-') && self.session_input.len() < MAX_SESSION_INPUT => {
                self.session_input.push(c);
            }
            _ => {}
        }
    }

    fn on_level_key(&mut self, key: KeyEvent) {
        let level_count = self.session.as_ref().map_or(0, |s| s.levels.len()) as u8;
        match key.code {
            KeyCode::Esc => self.screen = Screen::SessionSelect,
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Left | KeyCode::Up => self.selected_level = self.selected_level.saturating_sub(1).max(1),
            KeyCode::Right | KeyCode::Down => {
                self.selected_level = (self.selected_level + 1).min(level_count.max(1));
            }
            KeyCode::Enter => {
                let level = self.selected_level;
                self.start_level(level);
            }
            KeyCode::Char(c) if c.is_ascii_digit() => {
                let level = c as u8 - b'0';
                if self.session.as_ref().is_some_and(|s| s.level(level).is_some()) {
                    self.selected_level = level;
                    self.start_level(level);
                }
            }
            _ => {}
        }
    }

    fn on_game_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            if matches!(key.code, KeyCode::Char('d') | KeyCode::Char('D')) {
                self.reset_stats();
            }
            return;
        }

        let status = self.game.as_ref().map_or(GameStatus::Playing, Game::status);
        let input = match key.code {
            KeyCode::Esc => return self.back_to_levels(),
            KeyCode::Char('n') | KeyCode::Char('N') if status == GameStatus::Won => return self.next_level(),
            KeyCode::Char('r') | KeyCode::Char('R') if status.is_terminal() => return self.retry_level(),
            KeyCode::Char(c) if c.is_ascii_alphabetic() => GameInput::Letter(c),
            KeyCode::Backspace => GameInput::Backspace,
            KeyCode::Enter => GameInput::Submit,
            _ => return,
        };
        self.apply(input);
    }

    /// Feed one input to the running game and persist what it changed.
    pub fn apply(&mut self, input: GameInput) -> GameEvent {
        let Some(game) = self.game.as_mut() else {
            return GameEvent::Ignored;
        };
        let event = game.apply(input);

        match &event {
            GameEvent::Ignored => {}
            GameEvent::Rejected(e) => self.flash(e.to_string()),
            GameEvent::Edited => self.save_game(),
            GameEvent::Submitted(submission) => {
                self.save_game();
                if let Some(outcome) = submission.outcome {
                    self.finish_level(outcome);
                }
            }
        }
        event
    }

    fn save_game(&mut self) {
        let (Some(id), Some(game)) = (self.session_id().map(str::to_string), self.game.as_ref()) else {
            return;
        };
        if let Err(e) = self.store.save_game(&id, self.current_level, game) {
            error!("could not save game: {e}");
        }
    }

    fn finish_level(&mut self, outcome: LevelOutcome) {
        let Some(id) = self.session_id().map(str::to_string) else {
            return;
        };
        match self.store.complete_level(&id, self.current_level, outcome) {
            Ok((_, stats)) => self.stats = stats,
            Err(e) => {
                error!("could not record result: {e}");
                self.stats = self.store.load_stats();
            }
        }
        self.refresh_session();
        info!(session_id = %id, level = self.current_level, won = outcome.won, guesses = outcome.guess_count, "level finished");

        // only a win on the final level opens the session-complete screen
        let final_level = self
            .session
            .as_ref()
            .and_then(|s| s.levels.last())
            .is_some_and(|l| l.level_number == self.current_level);
        if outcome.won && final_level && self.session.as_ref().is_some_and(is_session_complete) {
            self.screen = Screen::SessionComplete;
        }
    }
}

/// Drive `app` from `runner` until it quits or the event source closes,
/// redrawing after every event.
pub fn run<B, S, E, T>(terminal: &mut Terminal<B>, app: &mut App<S>, runner: &Runner<E, T>) -> io::Result<()>
where
    B: Backend,
    S: KeyValueStore,
    E: EventSource,
    T: Ticker,
{
    terminal.draw(|f| f.render_widget(&*app, f.area()))?;
    loop {
        match runner.step() {
            AppEvent::Key(key) => app.on_key(key),
            AppEvent::Tick => {
                if app.message().is_none() {
                    continue;
                }
                app.on_tick();
            }
            AppEvent::Resize => {}
            AppEvent::Closed => break,
        }
        if app.should_quit() {
            break;
        }
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;
    }
    Ok(())
}
