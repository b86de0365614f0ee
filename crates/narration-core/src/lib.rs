//! Narration-synchronized timeline playback.
//!
//! A presentation is an ordered list of [`Section`]s. The core estimates how
//! long each section takes to speak, drives a host [`SpeechEngine`] one
//! section at a time, and turns engine callbacks plus wall-clock ticks into a
//! smooth overall progress value and a sentence-level subtitle.

pub mod bindings;
pub mod cancellation;
pub mod config;
pub mod controller;
pub mod error;
pub mod estimator;
pub mod progress;
pub mod schedule;
pub mod speech;
pub mod text_utils;
pub mod transport;
pub mod voice;

#[cfg(test)]
mod testing;

pub use bindings::export_ts_bindings;
pub use cancellation::CancellationToken;
pub use config::{LogLevel, NarrationConfig, load_config};
pub use controller::{
    PlaybackController, PlaybackEvent, PlaybackOptions, PlaybackState, TransportCommand,
};
pub use error::PlaybackError;
pub use estimator::EstimatorSettings;
pub use progress::ProgressReport;
pub use schedule::{Section, TimingSchedule, schedule};
pub use speech::{
    SpeakOptions, SpeechEngine, SpeechError, SpeechErrorReason, SpeechEvent, SpeechEventKind,
    UtteranceId,
};
pub use transport::{Transport, TransportEvent, TransportView};
pub use voice::{Voice, select_best};
