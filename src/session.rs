use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::evaluator::{MAX_GUESSES, WORD_LENGTH};

pub const LEVELS_PER_SESSION: usize = 3;
pub const MAX_SESSION_NAME_LEN: usize = 30;

/// All configured sessions keyed by `session_id`.
pub type Sessions = BTreeMap<String, Session>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    pub level_number: u8,
    pub word: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub best_score: Option<u32>,
}

impl Level {
    pub fn new(level_number: u8, word: impl Into<String>) -> Self {
        Self {
            level_number,
            word: word.into().to_uppercase(),
            completed: false,
            attempts: 0,
            best_score: None,
        }
    }

    /// Count one finished attempt; a win also marks completion and keeps the
    /// lowest guess count seen.
    pub fn record_attempt(&mut self, won: bool, guess_count: u32) {
        self.attempts += 1;
        if won {
            self.completed = true;
            self.best_score = Some(match self.best_score {
                Some(best) => best.min(guess_count),
                None => guess_count,
            });
        }
    }

    pub fn reset_progress(&mut self) {
        self.completed = false;
        self.attempts = 0;
        self.best_score = None;
    }

    fn copy_progress_from(&mut self, other: &Level) {
        self.completed = other.completed;
        self.attempts = other.attempts;
        // best_score only survives on completed levels
        self.best_score = other
            .best_score
            .filter(|s| other.completed && (1..=MAX_GUESSES as u32).contains(s));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub session_name: String,
    #[serde(default)]
    pub levels: Vec<Level>,
}

impl Session {
    pub fn new(
        session_id: impl Into<String>,
        session_name: impl Into<String>,
        words: [&str; LEVELS_PER_SESSION],
    ) -> Self {
        Self {
            session_id: session_id.into(),
            session_name: session_name.into(),
            levels: words
                .iter()
                .enumerate()
                .map(|(i, w)| Level::new(i as u8 + 1, *w))
                .collect(),
        }
    }

    pub fn level(&self, level_number: u8) -> Option<&Level> {
        self.levels.iter().find(|l| l.level_number == level_number)
    }

    pub fn level_mut(&mut self, level_number: u8) -> Option<&mut Level> {
        self.levels.iter_mut().find(|l| l.level_number == level_number)
    }

    pub fn reset_progress(&mut self) {
        self.levels.iter_mut().for_each(Level::reset_progress);
    }

    /// Carry progress over from `previous`, matching levels by position.
    pub fn merge_progress_from(&mut self, previous: &Session) {
        for (level, old) in self.levels.iter_mut().zip(previous.levels.iter()) {
            level.copy_progress_from(old);
        }
    }

    /// Replace name and words while keeping each level's progress.
    pub fn reconfigure(&mut self, session_name: &str, words: [&str; LEVELS_PER_SESSION]) {
        let previous = self.clone();
        *self = Session::new(self.session_id.clone(), session_name, words);
        self.merge_progress_from(&previous);
    }
}

/// Built-in session catalog.
pub fn default_catalog() -> Sessions {
    [
        ("session-1", "Beginner Challenge", ["CRANE", "SLATE", "AUDIO"]),
        ("session-2", "Intermediate Quest", ["THINK", "WORLD", "PLANT"]),
        ("session-3", "Advanced Trial", ["BRAVE", "QUICK", "FROST"]),
        ("session-4", "Expert Challenge", ["GRACE", "PRIDE", "TRIBE"]),
        ("session-5", "Master Tournament", ["STORM", "CLAIM", "BEAST"]),
    ]
    .into_iter()
    .map(|(id, name, words)| (id.to_string(), Session::new(id, name, words)))
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Session name is required")]
    NameRequired,
    #[error("Session name too long (max 30 characters)")]
    NameTooLong,
    #[error("Level {0} word must be exactly 5 letters")]
    WordLength(usize),
    #[error("Level {0} word must contain only letters A-Z")]
    WordCharacters(usize),
    #[error("Level {0} and Level {1} cannot have the same word")]
    DuplicateWords(usize, usize),
}

/// Outcome of checking an admin session configuration. Every violated rule
/// is listed, in rule order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigValidation {
    pub errors: Vec<ConfigError>,
    /// Trimmed name and uppercased words, ready to store.
    pub name: String,
    pub words: [String; LEVELS_PER_SESSION],
}

impl ConfigValidation {
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn word_refs(&self) -> [&str; LEVELS_PER_SESSION] {
        [&self.words[0], &self.words[1], &self.words[2]]
    }
}

impl std::fmt::Display for ConfigValidation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use itertools::Itertools;
        write!(f, "{}", self.errors.iter().join(", "))
    }
}

pub fn validate_session_config(name: &str, word1: &str, word2: &str, word3: &str) -> ConfigValidation {
    let name = name.trim().to_string();
    let words = [word1, word2, word3].map(|w| w.trim().to_uppercase());
    let mut errors = Vec::new();

    if name.is_empty() {
        errors.push(ConfigError::NameRequired);
    }
    if name.chars().count() > MAX_SESSION_NAME_LEN {
        errors.push(ConfigError::NameTooLong);
    }

    for (i, word) in words.iter().enumerate() {
        if word.chars().count() != WORD_LENGTH {
            errors.push(ConfigError::WordLength(i + 1));
        } else if !word.chars().all(|c| c.is_ascii_uppercase()) {
            errors.push(ConfigError::WordCharacters(i + 1));
        }
    }

    for (a, b) in [(0, 1), (0, 2), (1, 2)] {
        if !words[a].is_empty() && words[a] == words[b] {
            errors.push(ConfigError::DuplicateWords(a + 1, b + 1));
        }
    }

    ConfigValidation { errors, name, words }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionIdError {
    #[error("PLEASE ENTER A SESSION ID")]
    Empty,
    #[error("INVALID FORMAT! Enter session-1 to session-5")]
    InvalidFormat,
    #[error("NO SESSIONS FOUND! Run `retrowordle admin defaults` to create sessions")]
    NoSessions,
    #[error("SESSION NOT FOUND! Enter session-1 to session-5")]
    NotFound,
}

/// Trim and lowercase `input` and check it has the `session-N` shape.
pub fn parse_session_id(input: &str) -> Result<String, SessionIdError> {
    let id = input.trim().to_lowercase();
    if id.is_empty() {
        return Err(SessionIdError::Empty);
    }

    let well_formed = id
        .strip_prefix("session-")
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) && !n.starts_with('0'));
    if !well_formed {
        return Err(SessionIdError::InvalidFormat);
    }
    Ok(id)
}

/// Parse user input, then check it names a stored session.
pub fn normalize_session_id(input: &str, sessions: Option<&Sessions>) -> Result<String, SessionIdError> {
    let id = parse_session_id(input)?;
    match sessions {
        None => Err(SessionIdError::NoSessions),
        Some(s) if s.is_empty() => Err(SessionIdError::NoSessions),
        Some(s) if !s.contains_key(&id) => Err(SessionIdError::NotFound),
        Some(_) => Ok(id),
    }
}
