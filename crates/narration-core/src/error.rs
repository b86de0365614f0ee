//! Errors surfaced across the transport boundary.
//!
//! Stale callbacks, superseded utterances and an empty voice catalog are
//! expected conditions and never show up here.

use crate::speech::SpeechError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlaybackError {
    /// The engine failed an utterance for a reason other than our own
    /// cancellation. Playback has already been reset to idle.
    #[error("narration of section `{section}` failed: {source}")]
    Engine {
        section: String,
        #[source]
        source: SpeechError,
    },

    #[error("section id `{0}` appears more than once")]
    DuplicateSectionId(String),

    #[error("speech rate must be a positive number, got {0}")]
    InvalidRate(f32),

    #[error("voice `{0}` is not in the catalog")]
    VoiceNotFound(String),
}
