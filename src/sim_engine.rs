//! Clock-driven stand-in for a platform speech engine.
//!
//! Utterances "play" for roughly their estimated duration with a little
//! per-utterance jitter, the voice catalog shows up only after a short
//! delay, and cancelling an active utterance reports it as interrupted,
//! which is how browser and desktop engines behave.

use narration_core::estimator::estimate;
use narration_core::speech::{
    SpeakOptions, SpeechEngine, SpeechError, SpeechErrorReason, SpeechEvent, UtteranceId,
};
use narration_core::voice::Voice;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

const START_LATENCY: Duration = Duration::from_millis(120);
const CATALOG_DELAY: Duration = Duration::from_millis(300);

/// Something the host loop must forward to the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineNotice {
    Speech(SpeechEvent),
    VoicesChanged,
}

#[derive(Debug)]
struct ActiveUtterance {
    id: UtteranceId,
    queued_at: Instant,
    started_at: Option<Instant>,
    duration: Duration,
}

#[derive(Debug)]
pub struct SimulatedEngine {
    voices: Vec<Arc<Voice>>,
    catalog_ready_at: Instant,
    catalog_published: bool,
    active: Option<ActiveUtterance>,
    paused_at: Option<Instant>,
    pending: VecDeque<SpeechEvent>,
}

impl SimulatedEngine {
    pub fn new(now: Instant) -> Self {
        Self {
            voices: demo_catalog(),
            catalog_ready_at: now + CATALOG_DELAY,
            catalog_published: false,
            active: None,
            paused_at: None,
            pending: VecDeque::new(),
        }
    }

    /// Advance the simulated clock and collect notices due by `now`.
    pub fn poll(&mut self, now: Instant) -> Vec<EngineNotice> {
        let mut notices = Vec::new();
        if !self.catalog_published && now >= self.catalog_ready_at {
            self.catalog_published = true;
            debug!(voices = self.voices.len(), "Simulated voice catalog loaded");
            notices.push(EngineNotice::VoicesChanged);
        }
        notices.extend(self.pending.drain(..).map(EngineNotice::Speech));

        if self.paused_at.is_some() {
            return notices;
        }
        let Some(active) = self.active.as_mut() else {
            return notices;
        };
        if active.started_at.is_none() && now >= active.queued_at + START_LATENCY {
            active.started_at = Some(now);
            notices.push(EngineNotice::Speech(SpeechEvent::start(active.id)));
        }
        let finished = active
            .started_at
            .is_some_and(|started| now.saturating_duration_since(started) >= active.duration);
        if finished {
            trace!(utterance = active.id, "Simulated utterance finished");
            notices.push(EngineNotice::Speech(SpeechEvent::end(active.id)));
            self.active = None;
        }
        notices
    }
}

impl SpeechEngine for SimulatedEngine {
    fn voices(&self) -> Vec<Arc<Voice>> {
        if self.catalog_published {
            self.voices.clone()
        } else {
            Vec::new()
        }
    }

    fn speak(
        &mut self,
        utterance: UtteranceId,
        text: &str,
        options: &SpeakOptions,
    ) -> Result<(), SpeechError> {
        if options.volume < 0.0 || !options.rate.is_finite() {
            return Err(SpeechError::with_detail(
                SpeechErrorReason::InvalidArgument,
                "rate and volume must be usable numbers",
            ));
        }
        if let Some(previous) = self.active.take() {
            self.pending.push_back(SpeechEvent::error(
                previous.id,
                SpeechError::new(SpeechErrorReason::Interrupted),
            ));
        }
        let secs = estimate(text, options.rate) * jitter(utterance);
        debug!(
            utterance,
            voice = options.voice.as_ref().map(|voice| voice.name.as_str()).unwrap_or("default"),
            secs,
            "Simulated engine speaking"
        );
        self.paused_at = None;
        self.active = Some(ActiveUtterance {
            id: utterance,
            queued_at: Instant::now(),
            started_at: None,
            duration: Duration::from_secs_f64(secs),
        });
        Ok(())
    }

    fn pause(&mut self) {
        if self.paused_at.is_none() {
            self.paused_at = Some(Instant::now());
        }
    }

    fn resume(&mut self) {
        let Some(paused_at) = self.paused_at.take() else {
            return;
        };
        if let Some(active) = self.active.as_mut() {
            let paused_for = Instant::now().saturating_duration_since(paused_at);
            active.queued_at += paused_for;
            if let Some(started) = active.started_at.as_mut() {
                *started += paused_for;
            }
        }
    }

    fn cancel(&mut self) {
        self.paused_at = None;
        if let Some(active) = self.active.take() {
            let reason = if active.started_at.is_some() {
                SpeechErrorReason::Interrupted
            } else {
                SpeechErrorReason::Canceled
            };
            self.pending
                .push_back(SpeechEvent::error(active.id, SpeechError::new(reason)));
        }
    }
}

/// Deterministic spread of roughly ±10% so the estimate is never exact.
fn jitter(utterance: UtteranceId) -> f64 {
    0.9 + (utterance % 5) as f64 * 0.05
}

fn demo_catalog() -> Vec<Arc<Voice>> {
    [
        Voice::new("Fred", "en-US").local(),
        Voice::new("Samantha", "en-US").local(),
        Voice::new("Google UK English Female", "en-GB"),
        Voice::new("Google US English", "en-US"),
        Voice::new("Thomas", "fr-FR").local(),
    ]
    .into_iter()
    .map(Arc::new)
    .collect()
}
