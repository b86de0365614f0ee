//! Boundary to the host text-to-speech engine.
//!
//! The engine is a process-wide resource that holds at most one utterance at a
//! time. [`SpeechGateway`] is the only caller the playback controller uses: it
//! allocates utterance ids, tracks which one is current, and silences the
//! engine before anything new is spoken.

use crate::voice::Voice;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

/// Identity of one speak request. Engine events carry it back so late
/// callbacks for abandoned utterances can be recognised.
pub type UtteranceId = u64;

#[derive(Debug, Clone, PartialEq)]
pub struct SpeakOptions {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    /// `None` lets the engine use its default voice.
    pub voice: Option<Arc<Voice>>,
}

impl Default for SpeakOptions {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            voice: None,
        }
    }
}

/// Why the engine gave up on an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpeechErrorReason {
    /// Removed from the queue by `cancel()`.
    Canceled,
    /// Cut off by another speak request or `cancel()` mid-utterance.
    Interrupted,
    AudioBusy,
    AudioHardware,
    Network,
    SynthesisUnavailable,
    SynthesisFailed,
    LanguageUnavailable,
    VoiceUnavailable,
    TextTooLong,
    InvalidArgument,
    NotAllowed,
}

impl SpeechErrorReason {
    /// The utterance was abandoned on purpose, by us.
    pub fn is_superseded(self) -> bool {
        matches!(self, Self::Canceled | Self::Interrupted)
    }
}

impl fmt::Display for SpeechErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Canceled => "canceled",
            Self::Interrupted => "interrupted",
            Self::AudioBusy => "audio-busy",
            Self::AudioHardware => "audio-hardware",
            Self::Network => "network",
            Self::SynthesisUnavailable => "synthesis-unavailable",
            Self::SynthesisFailed => "synthesis-failed",
            Self::LanguageUnavailable => "language-unavailable",
            Self::VoiceUnavailable => "voice-unavailable",
            Self::TextTooLong => "text-too-long",
            Self::InvalidArgument => "invalid-argument",
            Self::NotAllowed => "not-allowed",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("speech engine error ({reason}){}", detail_suffix(.detail))]
pub struct SpeechError {
    pub reason: SpeechErrorReason,
    pub detail: Option<String>,
}

impl SpeechError {
    pub fn new(reason: SpeechErrorReason) -> Self {
        Self {
            reason,
            detail: None,
        }
    }

    pub fn with_detail(reason: SpeechErrorReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: Some(detail.into()),
        }
    }

    pub fn is_superseded(&self) -> bool {
        self.reason.is_superseded()
    }
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_ref()
        .map(|detail| format!(": {detail}"))
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEventKind {
    Start,
    End,
    Error(SpeechError),
}

/// Asynchronous notification from the engine about one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechEvent {
    pub utterance: UtteranceId,
    pub kind: SpeechEventKind,
}

impl SpeechEvent {
    pub fn start(utterance: UtteranceId) -> Self {
        Self {
            utterance,
            kind: SpeechEventKind::Start,
        }
    }

    pub fn end(utterance: UtteranceId) -> Self {
        Self {
            utterance,
            kind: SpeechEventKind::End,
        }
    }

    pub fn error(utterance: UtteranceId, error: SpeechError) -> Self {
        Self {
            utterance,
            kind: SpeechEventKind::Error(error),
        }
    }
}

/// Capabilities the playback core needs from a host speech engine.
///
/// `speak` queues one utterance and must later report, tagged with the given
/// id, an optional `Start` followed by exactly one `End` or `Error`. `pause`,
/// `resume` and `cancel` act on whatever the engine is currently speaking.
pub trait SpeechEngine {
    /// Current catalog; may be empty until the engine finishes loading.
    fn voices(&self) -> Vec<Arc<Voice>>;

    /// Synchronous refusals (no capability, bad arguments) are returned here;
    /// everything else arrives later as a [`SpeechEvent`].
    fn speak(
        &mut self,
        utterance: UtteranceId,
        text: &str,
        options: &SpeakOptions,
    ) -> Result<(), SpeechError>;

    fn pause(&mut self);

    fn resume(&mut self);

    fn cancel(&mut self);
}

/// Lets a host keep its own handle to an engine it also drives, e.g. to pump
/// its events from the same loop.
impl<E: SpeechEngine> SpeechEngine for Rc<RefCell<E>> {
    fn voices(&self) -> Vec<Arc<Voice>> {
        self.borrow().voices()
    }

    fn speak(
        &mut self,
        utterance: UtteranceId,
        text: &str,
        options: &SpeakOptions,
    ) -> Result<(), SpeechError> {
        self.borrow_mut().speak(utterance, text, options)
    }

    fn pause(&mut self) {
        self.borrow_mut().pause();
    }

    fn resume(&mut self) {
        self.borrow_mut().resume();
    }

    fn cancel(&mut self) {
        self.borrow_mut().cancel();
    }
}

/// Sole caller of the engine, tracking the utterance it currently owns.
pub struct SpeechGateway<E> {
    engine: E,
    current: Option<UtteranceId>,
    next_id: UtteranceId,
}

impl<E: SpeechEngine> SpeechGateway<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            current: None,
            next_id: 1,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn voices(&self) -> Vec<Arc<Voice>> {
        self.engine.voices()
    }

    pub fn current(&self) -> Option<UtteranceId> {
        self.current
    }

    pub fn is_current(&self, utterance: UtteranceId) -> bool {
        self.current == Some(utterance)
    }

    /// Speak `text` as a new utterance, cancelling the one we still own first.
    ///
    /// On a synchronous refusal nothing is left tracked.
    pub fn begin(&mut self, text: &str, options: &SpeakOptions) -> Result<UtteranceId, SpeechError> {
        if let Some(previous) = self.current.take() {
            debug!(utterance = previous, "Cancelling active utterance before speaking");
            self.engine.cancel();
        }
        let utterance = self.allocate_id();
        self.engine.speak(utterance, text, options)?;
        trace!(utterance, chars = text.len(), "Utterance queued");
        self.current = Some(utterance);
        Ok(utterance)
    }

    /// Silence the engine unconditionally, including utterances queued by
    /// other speakers sharing it.
    pub fn silence(&mut self) {
        self.current = None;
        self.engine.cancel();
    }

    /// Cancel our own utterance, if any.
    pub fn cancel(&mut self) {
        if let Some(utterance) = self.current.take() {
            debug!(utterance, "Cancelling utterance");
            self.engine.cancel();
        }
    }

    /// Forget an utterance the engine has already finished with.
    pub fn release(&mut self, utterance: UtteranceId) {
        if self.is_current(utterance) {
            self.current = None;
        }
    }

    pub fn pause(&mut self) {
        if self.current.is_some() {
            self.engine.pause();
        }
    }

    pub fn resume(&mut self) {
        if self.current.is_some() {
            self.engine.resume();
        }
    }

    fn allocate_id(&mut self) -> UtteranceId {
        let utterance = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        utterance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EngineCall, RecordingEngine};

    #[test]
    fn begin_cancels_exactly_once_when_an_utterance_is_active() {
        let mut gateway = SpeechGateway::new(RecordingEngine::default());
        let first = gateway.begin("one", &SpeakOptions::default()).unwrap();
        let second = gateway.begin("two", &SpeakOptions::default()).unwrap();

        assert_ne!(first, second);
        assert_eq!(
            gateway.engine().calls,
            vec![
                EngineCall::Speak(first, "one".to_string()),
                EngineCall::Cancel,
                EngineCall::Speak(second, "two".to_string()),
            ]
        );
        assert!(gateway.is_current(second));
    }

    #[test]
    fn released_utterance_is_not_cancelled_again() {
        let mut gateway = SpeechGateway::new(RecordingEngine::default());
        let first = gateway.begin("one", &SpeakOptions::default()).unwrap();
        gateway.release(first);
        let _ = gateway.begin("two", &SpeakOptions::default()).unwrap();

        assert!(!gateway.engine().calls.contains(&EngineCall::Cancel));
    }

    #[test]
    fn refused_speak_leaves_nothing_tracked() {
        let mut engine = RecordingEngine::default();
        engine.refuse_with = Some(SpeechError::new(SpeechErrorReason::SynthesisUnavailable));
        let mut gateway = SpeechGateway::new(engine);

        let result = gateway.begin("one", &SpeakOptions::default());

        assert!(result.is_err());
        assert_eq!(gateway.current(), None);
    }

    #[test]
    fn pause_and_resume_need_an_owned_utterance() {
        let mut gateway = SpeechGateway::new(RecordingEngine::default());
        gateway.pause();
        gateway.resume();
        assert!(gateway.engine().calls.is_empty());
    }

    #[test]
    fn error_display_includes_reason_and_detail() {
        let error = SpeechError::with_detail(SpeechErrorReason::VoiceUnavailable, "no voices");
        assert_eq!(error.to_string(), "speech engine error (voice-unavailable): no voices");
        assert!(SpeechError::new(SpeechErrorReason::Interrupted).is_superseded());
        assert!(!error.is_superseded());
    }
}
