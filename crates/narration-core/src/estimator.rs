//! Spoken-duration prediction for narration text.
//!
//! Speech engines do not report how long an utterance will take, so the
//! schedule is built from an estimate. Two independent estimates are taken
//! (word cadence and character cadence) and the larger one wins; dense
//! technical text with long tokens is otherwise badly underestimated. Pauses
//! for sentence and clause punctuation are added on top and the result never
//! drops below a floor, so no section gets a zero-length slot.

use crate::text_utils::{count_clause_breaks, count_sentence_breaks, count_words, spoken_char_count};

/// Baseline cadence at rate 1.0 (150 words per minute).
pub const BASE_WORDS_PER_SECOND: f64 = 2.5;
pub const BASE_CHARS_PER_SECOND: f64 = 14.0;
pub const SENTENCE_PAUSE_SECS: f64 = 0.35;
pub const CLAUSE_PAUSE_SECS: f64 = 0.15;
/// Shortest slot any section can occupy in a schedule.
pub const MIN_DURATION_SECS: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorSettings {
    pub words_per_second: f64,
    pub chars_per_second: f64,
    pub sentence_pause_secs: f64,
    pub clause_pause_secs: f64,
    pub min_duration_secs: f64,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            words_per_second: BASE_WORDS_PER_SECOND,
            chars_per_second: BASE_CHARS_PER_SECOND,
            sentence_pause_secs: SENTENCE_PAUSE_SECS,
            clause_pause_secs: CLAUSE_PAUSE_SECS,
            min_duration_secs: MIN_DURATION_SECS,
        }
    }
}

impl EstimatorSettings {
    /// Predicted speaking time in seconds for `text` at `rate` (1.0 = normal).
    ///
    /// Pause allowances are fixed and do not scale with rate.
    pub fn estimate(&self, text: &str, rate: f32) -> f64 {
        let rate = effective_rate(rate);
        let word_secs = count_words(text) as f64 / (self.words_per_second * rate);
        let char_secs = spoken_char_count(text) as f64 / (self.chars_per_second * rate);
        let pauses = count_sentence_breaks(text) as f64 * self.sentence_pause_secs
            + count_clause_breaks(text) as f64 * self.clause_pause_secs;
        (word_secs.max(char_secs) + pauses).max(self.min_duration_secs)
    }

    /// Replace non-positive or non-finite values with the built-in constants.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let positive = |value: f64, fallback: f64| {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                fallback
            }
        };
        let non_negative = |value: f64, fallback: f64| {
            if value.is_finite() && value >= 0.0 {
                value
            } else {
                fallback
            }
        };
        Self {
            words_per_second: positive(self.words_per_second, defaults.words_per_second),
            chars_per_second: positive(self.chars_per_second, defaults.chars_per_second),
            sentence_pause_secs: non_negative(self.sentence_pause_secs, defaults.sentence_pause_secs),
            clause_pause_secs: non_negative(self.clause_pause_secs, defaults.clause_pause_secs),
            min_duration_secs: positive(self.min_duration_secs, defaults.min_duration_secs),
        }
    }
}

/// Estimate with the canonical constants.
pub fn estimate(text: &str, rate: f32) -> f64 {
    EstimatorSettings::default().estimate(text, rate)
}

fn effective_rate(rate: f32) -> f64 {
    if rate.is_finite() && rate > 0.0 {
        rate as f64
    } else {
        1.0
    }
}
