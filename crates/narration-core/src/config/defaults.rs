use crate::config::LogLevel;
use crate::estimator;

pub(crate) fn default_log_level() -> LogLevel {
    LogLevel::Info
}

pub(crate) fn default_rate() -> f32 {
    1.0
}

pub(crate) fn default_pitch() -> f32 {
    1.0
}

pub(crate) fn default_volume() -> f32 {
    1.0
}

pub(crate) fn default_tick_interval_ms() -> u64 {
    100
}

pub(crate) fn default_words_per_second() -> f64 {
    estimator::BASE_WORDS_PER_SECOND
}

pub(crate) fn default_chars_per_second() -> f64 {
    estimator::BASE_CHARS_PER_SECOND
}

pub(crate) fn default_sentence_pause_secs() -> f64 {
    estimator::SENTENCE_PAUSE_SECS
}

pub(crate) fn default_clause_pause_secs() -> f64 {
    estimator::CLAUSE_PAUSE_SECS
}

pub(crate) fn default_min_duration_secs() -> f64 {
    estimator::MIN_DURATION_SECS
}
