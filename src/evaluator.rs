use itertools::Itertools;
use serde::{Deserialize, Serialize};

pub const WORD_LENGTH: usize = 5;
pub const MAX_GUESSES: usize = 6;

/// Per-letter feedback for a submitted guess
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LetterStatus {
    Correct,
    Present,
    Absent,
}

impl LetterStatus {
    pub fn share_symbol(self) -> char {
        match self {
            LetterStatus::Correct => '🟩',
            LetterStatus::Present => '🟨',
            LetterStatus::Absent => '⬛',
        }
    }
}

pub type Evaluation = [LetterStatus; WORD_LENGTH];

/// Compare `guess` against `target` using the two-pass duplicate-safe rules.
///
/// Exact matches are marked and consumed first; the remaining guess letters
/// then claim unconsumed target letters left to right. Comparison is on bytes
/// and case-sensitive, callers normalise to uppercase. Positions past the end
/// of a short input never match.
pub fn evaluate(guess: &str, target: &str) -> Evaluation {
    let guess = letters(guess);
    let mut remaining = letters(target);
    let mut result = [LetterStatus::Absent; WORD_LENGTH];

    for i in 0..WORD_LENGTH {
        if guess[i].is_some() && guess[i] == remaining[i] {
            result[i] = LetterStatus::Correct;
            remaining[i] = None;
        }
    }

    for i in 0..WORD_LENGTH {
        if result[i] == LetterStatus::Correct {
            continue;
        }
        let Some(letter) = guess[i] else { continue };
        if let Some(slot) = remaining.iter_mut().find(|slot| **slot == Some(letter)) {
            result[i] = LetterStatus::Present;
            *slot = None;
        }
    }

    result
}

pub fn is_win(evaluation: &Evaluation) -> bool {
    evaluation.iter().all(|s| *s == LetterStatus::Correct)
}

fn letters(word: &str) -> [Option<u8>; WORD_LENGTH] {
    let mut out = [None; WORD_LENGTH];
    for (slot, b) in out.iter_mut().zip(word.bytes()) {
        *slot = Some(b);
    }
    out
}

/// Emoji grid for sharing a finished level, e.g. `Retro Wordle 3/6`.
pub fn share_text(guesses: &[String], target: &str, won: bool) -> String {
    let score = if won {
        guesses.len().to_string()
    } else {
        "X".to_string()
    };
    let grid = guesses
        .iter()
        .map(|g| evaluate(g, target).iter().map(|s| s.share_symbol()).collect::<String>())
        .join("\n");
    format!("Retro Wordle {}/{}\n\n{}\n", score, MAX_GUESSES, grid)
}
