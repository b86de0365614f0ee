use super::defaults;
use super::models::{LogLevel, NarrationConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    speech: SpeechConfig,
    #[serde(default)]
    progress: ProgressConfig,
    #[serde(default)]
    estimator: EstimatorConfig,
}

impl From<ConfigTables> for NarrationConfig {
    fn from(tables: ConfigTables) -> Self {
        NarrationConfig {
            log_level: tables.logging.log_level,
            rate: tables.speech.rate,
            pitch: tables.speech.pitch,
            volume: tables.speech.volume,
            preferred_voice: tables.speech.preferred_voice,
            tick_interval_ms: tables.progress.tick_interval_ms,
            words_per_second: tables.estimator.words_per_second,
            chars_per_second: tables.estimator.chars_per_second,
            sentence_pause_secs: tables.estimator.sentence_pause_secs,
            clause_pause_secs: tables.estimator.clause_pause_secs,
            min_duration_secs: tables.estimator.min_duration_secs,
        }
    }
}

impl From<&NarrationConfig> for ConfigTables {
    fn from(config: &NarrationConfig) -> Self {
        ConfigTables {
            logging: LoggingConfig {
                log_level: config.log_level,
            },
            speech: SpeechConfig {
                rate: config.rate,
                pitch: config.pitch,
                volume: config.volume,
                preferred_voice: config.preferred_voice.clone(),
            },
            progress: ProgressConfig {
                tick_interval_ms: config.tick_interval_ms,
            },
            estimator: EstimatorConfig {
                words_per_second: config.words_per_second,
                chars_per_second: config.chars_per_second,
                sentence_pause_secs: config.sentence_pause_secs,
                clause_pause_secs: config.clause_pause_secs,
                min_duration_secs: config.min_duration_secs,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: defaults::default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct SpeechConfig {
    #[serde(default = "defaults::default_rate")]
    rate: f32,
    #[serde(default = "defaults::default_pitch")]
    pitch: f32,
    #[serde(default = "defaults::default_volume")]
    volume: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preferred_voice: Option<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        SpeechConfig {
            rate: defaults::default_rate(),
            pitch: defaults::default_pitch(),
            volume: defaults::default_volume(),
            preferred_voice: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct ProgressConfig {
    #[serde(default = "defaults::default_tick_interval_ms")]
    tick_interval_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        ProgressConfig {
            tick_interval_ms: defaults::default_tick_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct EstimatorConfig {
    #[serde(default = "defaults::default_words_per_second")]
    words_per_second: f64,
    #[serde(default = "defaults::default_chars_per_second")]
    chars_per_second: f64,
    #[serde(default = "defaults::default_sentence_pause_secs")]
    sentence_pause_secs: f64,
    #[serde(default = "defaults::default_clause_pause_secs")]
    clause_pause_secs: f64,
    #[serde(default = "defaults::default_min_duration_secs")]
    min_duration_secs: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        EstimatorConfig {
            words_per_second: defaults::default_words_per_second(),
            chars_per_second: defaults::default_chars_per_second(),
            sentence_pause_secs: defaults::default_sentence_pause_secs(),
            clause_pause_secs: defaults::default_clause_pause_secs(),
            min_duration_secs: defaults::default_min_duration_secs(),
        }
    }
}
