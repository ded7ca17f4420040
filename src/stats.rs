use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::evaluator::MAX_GUESSES;

/// Aggregate results across every finished level, independent of sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Stats {
    pub games_played: u32,
    pub games_won: u32,
    pub current_streak: u32,
    pub max_streak: u32,
    /// Index 0 counts wins in one guess, index 5 wins in six.
    pub guess_distribution: [u32; MAX_GUESSES],
    pub last_played_date: Option<DateTime<Utc>>,
}

impl Stats {
    pub fn record_game(&mut self, won: bool, guess_count: u32) {
        self.record_game_at(won, guess_count, Utc::now());
    }

    pub fn record_game_at(&mut self, won: bool, guess_count: u32, now: DateTime<Utc>) {
        self.games_played += 1;

        if won {
            self.games_won += 1;
            self.current_streak += 1;
            self.max_streak = self.max_streak.max(self.current_streak);
            if (1..=MAX_GUESSES as u32).contains(&guess_count) {
                self.guess_distribution[guess_count as usize - 1] += 1;
            }
        } else {
            self.current_streak = 0;
        }

        self.last_played_date = Some(now.date_naive().and_time(NaiveTime::MIN).and_utc());
    }

    /// Rounded win rate in percent; 0 when nothing has been played.
    pub fn win_percentage(&self) -> u32 {
        if self.games_played == 0 {
            return 0;
        }
        ((self.games_won as f64 / self.games_played as f64) * 100.0).round() as u32
    }

    /// Largest bucket, used to scale distribution bars.
    pub fn max_distribution(&self) -> u32 {
        self.guess_distribution.iter().copied().max().unwrap_or(0)
    }
}
