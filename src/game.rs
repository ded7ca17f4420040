use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::evaluator::{evaluate, is_win, share_text, Evaluation, LetterStatus, MAX_GUESSES, WORD_LENGTH};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GameStatus {
    #[default]
    Playing,
    Won,
    Lost,
}

impl GameStatus {
    pub fn is_terminal(self) -> bool {
        self != GameStatus::Playing
    }
}

/// Persisted snapshot of one level in progress
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub guesses: Vec<String>,
    pub current_row: usize,
    #[serde(default)]
    pub current_guess: String,
    pub game_status: GameStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GuessError {
    #[error("Not enough letters")]
    NotEnoughLetters,
    #[error("Game is already over")]
    GameOver,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResumeError {
    #[error("snapshot has {0} guesses, at most 6 allowed")]
    TooManyGuesses(usize),
    #[error("guess {0:?} is not a 5-letter word")]
    MalformedGuess(String),
    #[error("row {0} is out of range")]
    RowOutOfRange(usize),
    #[error("pending input {0:?} is not valid")]
    MalformedCurrentGuess(String),
    #[error("guess {0} already matched the target but play continued")]
    GuessAfterWin(usize),
    #[error("status {recorded} does not match the guesses (expected {derived})")]
    StatusMismatch {
        recorded: GameStatus,
        derived: GameStatus,
    },
}

/// Input events consumed by the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameInput {
    Letter(char),
    Backspace,
    Submit,
}

/// Terminal result of a level, handed to persistence and stats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelOutcome {
    pub won: bool,
    pub guess_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub evaluation: Evaluation,
    /// Set when this guess ended the level.
    pub outcome: Option<LevelOutcome>,
}

/// What an input did to the game
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    Ignored,
    Edited,
    Rejected(GuessError),
    Submitted(Submission),
}

/// One level's guessing round against a fixed target word.
#[derive(Debug, Clone)]
pub struct Game {
    target: String,
    progress: LevelProgress,
}

impl Game {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into().to_uppercase(),
            progress: LevelProgress::default(),
        }
    }

    /// Rebuild a game from a persisted snapshot after checking its shape.
    pub fn resume(target: impl Into<String>, snapshot: LevelProgress) -> Result<Self, ResumeError> {
        let target = target.into().to_uppercase();
        let mut progress = snapshot;

        if progress.guesses.len() > MAX_GUESSES {
            return Err(ResumeError::TooManyGuesses(progress.guesses.len()));
        }
        if progress.current_row > MAX_GUESSES {
            return Err(ResumeError::RowOutOfRange(progress.current_row));
        }
        for guess in progress.guesses.iter_mut() {
            if !is_word(guess) {
                return Err(ResumeError::MalformedGuess(guess.clone()));
            }
            *guess = guess.to_uppercase();
        }
        let pending = &progress.current_guess;
        if pending.len() > WORD_LENGTH || !pending.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ResumeError::MalformedCurrentGuess(pending.clone()));
        }
        let earlier = progress.guesses.len().saturating_sub(1);
        if let Some(row) = progress.guesses[..earlier].iter().position(|g| *g == target) {
            return Err(ResumeError::GuessAfterWin(row + 1));
        }

        let derived = derive_status(&progress.guesses, &target);
        if derived != progress.game_status {
            return Err(ResumeError::StatusMismatch {
                recorded: progress.game_status,
                derived,
            });
        }

        progress.current_guess = if derived.is_terminal() {
            String::new()
        } else {
            progress.current_guess.to_uppercase()
        };
        progress.current_row = progress.guesses.len();

        Ok(Self { target, progress })
    }

    /// Resume when the snapshot is usable, otherwise start fresh.
    pub fn resume_or_new(target: impl Into<String>, snapshot: Option<LevelProgress>) -> Self {
        let target = target.into();
        match snapshot {
            Some(snapshot) => match Self::resume(target.clone(), snapshot) {
                Ok(game) => {
                    debug!(rows = game.current_row(), status = %game.status(), "resumed saved game");
                    game
                }
                Err(e) => {
                    warn!("corrupted saved game ({e}), starting fresh");
                    Self::new(target)
                }
            },
            None => Self::new(target),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn guesses(&self) -> &[String] {
        &self.progress.guesses
    }

    pub fn current_row(&self) -> usize {
        self.progress.current_row
    }

    pub fn current_guess(&self) -> &str {
        &self.progress.current_guess
    }

    pub fn status(&self) -> GameStatus {
        self.progress.game_status
    }

    pub fn is_over(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn progress(&self) -> &LevelProgress {
        &self.progress
    }

    /// Snapshot for persistence, stamped with the current time.
    pub fn snapshot(&self) -> LevelProgress {
        LevelProgress {
            saved_at: Some(Utc::now()),
            ..self.progress.clone()
        }
    }

    pub fn append_letter(&mut self, letter: char) -> bool {
        if self.is_over() || self.progress.current_guess.len() >= WORD_LENGTH || !letter.is_ascii_uppercase() {
            return false;
        }
        self.progress.current_guess.push(letter);
        true
    }

    pub fn backspace(&mut self) -> bool {
        if self.is_over() {
            return false;
        }
        self.progress.current_guess.pop().is_some()
    }

    pub fn submit_guess(&mut self) -> Result<Submission, GuessError> {
        if self.is_over() {
            return Err(GuessError::GameOver);
        }
        if self.progress.current_guess.len() != WORD_LENGTH {
            return Err(GuessError::NotEnoughLetters);
        }

        let guess = std::mem::take(&mut self.progress.current_guess);
        let evaluation = evaluate(&guess, &self.target);
        self.progress.guesses.push(guess);
        self.progress.current_row = self.progress.guesses.len();

        let guess_count = self.progress.guesses.len() as u32;
        let outcome = if is_win(&evaluation) {
            self.progress.game_status = GameStatus::Won;
            Some(LevelOutcome { won: true, guess_count })
        } else if self.progress.current_row >= MAX_GUESSES {
            self.progress.game_status = GameStatus::Lost;
            Some(LevelOutcome { won: false, guess_count })
        } else {
            None
        };

        debug!(row = self.progress.current_row, status = %self.progress.game_status, "guess submitted");
        Ok(Submission { evaluation, outcome })
    }

    pub fn apply(&mut self, input: GameInput) -> GameEvent {
        match input {
            GameInput::Letter(c) => {
                if self.append_letter(c.to_ascii_uppercase()) {
                    GameEvent::Edited
                } else {
                    GameEvent::Ignored
                }
            }
            GameInput::Backspace => {
                if self.backspace() {
                    GameEvent::Edited
                } else {
                    GameEvent::Ignored
                }
            }
            GameInput::Submit => match self.submit_guess() {
                Ok(submission) => GameEvent::Submitted(submission),
                Err(e) => GameEvent::Rejected(e),
            },
        }
    }

    pub fn evaluations(&self) -> Vec<Evaluation> {
        self.progress
            .guesses
            .iter()
            .map(|g| evaluate(g, &self.target))
            .collect()
    }

    /// Best status seen per letter, for colouring an on-screen keyboard.
    pub fn letter_hints(&self) -> BTreeMap<char, LetterStatus> {
        let mut hints = BTreeMap::new();
        for (guess, evaluation) in self.progress.guesses.iter().zip(self.evaluations()) {
            for (c, status) in guess.chars().zip(evaluation) {
                let entry = hints.entry(c).or_insert(status);
                if rank(status) > rank(*entry) {
                    *entry = status;
                }
            }
        }
        hints
    }

    pub fn share_text(&self) -> String {
        share_text(&self.progress.guesses, &self.target, self.status() == GameStatus::Won)
    }
}

fn rank(status: LetterStatus) -> u8 {
    match status {
        LetterStatus::Absent => 0,
        LetterStatus::Present => 1,
        LetterStatus::Correct => 2,
    }
}

fn is_word(s: &str) -> bool {
    s.len() == WORD_LENGTH && s.chars().all(|c| c.is_ascii_alphabetic())
}

fn derive_status(guesses: &[String], target: &str) -> GameStatus {
    if guesses.last().is_some_and(|g| g == target) {
        GameStatus::Won
    } else if guesses.len() >= MAX_GUESSES {
        GameStatus::Lost
    } else {
        GameStatus::Playing
    }
}
