//! Typing performance scoring
//!
//! Pure functions over typed text, expected text and elapsed time.
//! Lengths count Unicode scalar values. Rounding is half-up to the nearest
//! integer; accuracy is also kept to two decimals for storage.

use serde::{Deserialize, Serialize};

/// Characters per "word" for WPM
pub const CHARS_PER_WORD: usize = 5;

/// Speed unit of a typing test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedMetric {
    /// Keyboard tests
    WordsPerMinute,
    /// Numeric keypad (10-key) tests
    KeystrokesPerHour,
}

/// Positional matches over the overlap of both strings
pub fn correct_character_count(typed: &str, expected: &str) -> usize {
    typed
        .chars()
        .zip(expected.chars())
        .filter(|(t, e)| t == e)
        .count()
}

/// `100 × correct / len(typed)`; 100 when nothing has been typed
pub fn accuracy(typed: &str, expected: &str) -> f64 {
    let typed_len = typed.chars().count();
    if typed_len == 0 {
        return 100.0;
    }
    100.0 * correct_character_count(typed, expected) as f64 / typed_len as f64
}

/// Round to two decimals for storage and display
pub fn round_accuracy(accuracy: f64) -> f64 {
    (accuracy * 100.0).round() / 100.0
}

/// `round(floor(chars / 5) / minutes)`, 0 when no time has elapsed
pub fn words_per_minute(characters: usize, elapsed_seconds: f64) -> i32 {
    let minutes = elapsed_seconds / 60.0;
    if !(minutes > 0.0) {
        return 0;
    }
    let words = (characters / CHARS_PER_WORD) as f64;
    (words / minutes).round() as i32
}

/// `round(chars / hours)`, 0 when no time has elapsed
pub fn keystrokes_per_hour(characters: usize, elapsed_seconds: f64) -> i32 {
    let hours = elapsed_seconds / 3600.0;
    if !(hours > 0.0) {
        return 0;
    }
    (characters as f64 / hours).round() as i32
}

/// `round(raw × accuracy / 100)` using the unrounded accuracy
pub fn weighted_speed(raw_speed: i32, accuracy: f64) -> i32 {
    (raw_speed as f64 * accuracy / 100.0).round() as i32
}

/// Word-level positional accuracy over the overlap length.
///
/// 100 when no words were typed; 0 when words were typed against an empty
/// expectation.
pub fn word_accuracy(typed: &str, expected: &str) -> f64 {
    let typed_words: Vec<&str> = typed.split_whitespace().collect();
    let expected_words: Vec<&str> = expected.split_whitespace().collect();
    let overlap = typed_words.len().min(expected_words.len());

    if overlap == 0 {
        return if typed_words.is_empty() { 100.0 } else { 0.0 };
    }

    let matches = typed_words
        .iter()
        .zip(expected_words.iter())
        .filter(|(t, e)| t == e)
        .count();
    100.0 * matches as f64 / overlap as f64
}

/// All metrics for one snapshot of typed text
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub characters_typed: usize,
    pub correct_characters: usize,
    /// Rounded to two decimals
    pub accuracy: f64,
    pub raw_speed: i32,
    pub weighted_speed: i32,
    pub word_accuracy: f64,
}

pub fn score(typed: &str, expected: &str, elapsed_seconds: f64, metric: SpeedMetric) -> ScoreSummary {
    let characters_typed = typed.chars().count();
    let unrounded_accuracy = accuracy(typed, expected);

    let raw_speed = match metric {
        SpeedMetric::WordsPerMinute => words_per_minute(characters_typed, elapsed_seconds),
        SpeedMetric::KeystrokesPerHour => keystrokes_per_hour(characters_typed, elapsed_seconds),
    };

    ScoreSummary {
        characters_typed,
        correct_characters: correct_character_count(typed, expected),
        accuracy: round_accuracy(unrounded_accuracy),
        raw_speed,
        weighted_speed: weighted_speed(raw_speed, unrounded_accuracy),
        word_accuracy: round_accuracy(word_accuracy(typed, expected)),
    }
}
