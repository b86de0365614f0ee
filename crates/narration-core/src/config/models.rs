use crate::controller::{MAX_RATE, MIN_RATE, PlaybackOptions};
use crate::estimator::EstimatorSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Flattened view of every tunable, as the rest of the crate consumes it.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationConfig {
    pub log_level: LogLevel,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub preferred_voice: Option<String>,
    pub tick_interval_ms: u64,
    pub words_per_second: f64,
    pub chars_per_second: f64,
    pub sentence_pause_secs: f64,
    pub clause_pause_secs: f64,
    pub min_duration_secs: f64,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        NarrationConfig {
            log_level: crate::config::defaults::default_log_level(),
            rate: crate::config::defaults::default_rate(),
            pitch: crate::config::defaults::default_pitch(),
            volume: crate::config::defaults::default_volume(),
            preferred_voice: None,
            tick_interval_ms: crate::config::defaults::default_tick_interval_ms(),
            words_per_second: crate::config::defaults::default_words_per_second(),
            chars_per_second: crate::config::defaults::default_chars_per_second(),
            sentence_pause_secs: crate::config::defaults::default_sentence_pause_secs(),
            clause_pause_secs: crate::config::defaults::default_clause_pause_secs(),
            min_duration_secs: crate::config::defaults::default_min_duration_secs(),
        }
    }
}

impl NarrationConfig {
    /// Bring every value into a range playback accepts.
    pub fn sanitized(mut self) -> Self {
        let defaults = NarrationConfig::default();
        self.rate = if self.rate.is_finite() && self.rate > 0.0 {
            self.rate.clamp(MIN_RATE, MAX_RATE)
        } else {
            defaults.rate
        };
        self.pitch = if self.pitch.is_finite() {
            self.pitch.clamp(0.0, 2.0)
        } else {
            defaults.pitch
        };
        self.volume = if self.volume.is_finite() {
            self.volume.clamp(0.0, 1.0)
        } else {
            defaults.volume
        };
        if self.tick_interval_ms == 0 {
            self.tick_interval_ms = defaults.tick_interval_ms;
        }
        self.preferred_voice = self
            .preferred_voice
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        let estimator = self.estimator_settings().sanitized();
        self.words_per_second = estimator.words_per_second;
        self.chars_per_second = estimator.chars_per_second;
        self.sentence_pause_secs = estimator.sentence_pause_secs;
        self.clause_pause_secs = estimator.clause_pause_secs;
        self.min_duration_secs = estimator.min_duration_secs;
        self
    }

    pub fn estimator_settings(&self) -> EstimatorSettings {
        EstimatorSettings {
            words_per_second: self.words_per_second,
            chars_per_second: self.chars_per_second,
            sentence_pause_secs: self.sentence_pause_secs,
            clause_pause_secs: self.clause_pause_secs,
            min_duration_secs: self.min_duration_secs,
        }
    }

    pub fn playback_options(&self) -> PlaybackOptions {
        PlaybackOptions {
            rate: self.rate,
            pitch: self.pitch,
            volume: self.volume,
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            preferred_voice: self.preferred_voice.clone(),
            estimator: self.estimator_settings(),
        }
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
