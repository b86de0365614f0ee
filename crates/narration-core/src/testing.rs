//! Test doubles shared by the unit tests.

use crate::speech::{SpeakOptions, SpeechEngine, SpeechError, UtteranceId};
use crate::voice::Voice;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Speak(UtteranceId, String),
    Pause,
    Resume,
    Cancel,
}

/// Engine that records every call and never emits events on its own; tests
/// feed start/end/error events to the controller by hand.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    pub calls: Vec<EngineCall>,
    pub catalog: Vec<Arc<Voice>>,
    pub last_options: Option<SpeakOptions>,
    pub refuse_with: Option<SpeechError>,
}

impl RecordingEngine {
    pub fn with_voices(voices: Vec<Voice>) -> Self {
        Self {
            catalog: voices.into_iter().map(Arc::new).collect(),
            ..Self::default()
        }
    }

    pub fn spoken(&self) -> Vec<(UtteranceId, String)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::Speak(utterance, text) => Some((*utterance, text.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &EngineCall) -> usize {
        self.calls.iter().filter(|recorded| *recorded == call).count()
    }
}

impl SpeechEngine for RecordingEngine {
    fn voices(&self) -> Vec<Arc<Voice>> {
        self.catalog.clone()
    }

    fn speak(
        &mut self,
        utterance: UtteranceId,
        text: &str,
        options: &SpeakOptions,
    ) -> Result<(), SpeechError> {
        if let Some(error) = self.refuse_with.clone() {
            return Err(error);
        }
        self.calls.push(EngineCall::Speak(utterance, text.to_string()));
        self.last_options = Some(options.clone());
        Ok(())
    }

    fn pause(&mut self) {
        self.calls.push(EngineCall::Pause);
    }

    fn resume(&mut self) {
        self.calls.push(EngineCall::Resume);
    }

    fn cancel(&mut self) {
        self.calls.push(EngineCall::Cancel);
    }
}
