//! Narration playback state machine.
//!
//! Everything that can happen to a presentation arrives as a
//! [`PlaybackEvent`]: a user command, an engine `start`/`end`/`error`
//! notification, a progress tick, or a voice catalog change. Engine events are
//! matched against the utterance the gateway currently owns, so callbacks for
//! utterances that were cancelled or replaced are dropped before they can
//! advance or resurrect anything.

use crate::error::PlaybackError;
use crate::estimator::EstimatorSettings;
use crate::progress::{ProgressReport, ProgressReporter};
use crate::schedule::{ScheduleCache, Section, TimingSchedule, validate_sections};
use crate::speech::{
    SpeakOptions, SpeechEngine, SpeechError, SpeechEvent, SpeechEventKind, SpeechGateway,
    UtteranceId,
};
use crate::voice::{Voice, find_by_name, select_best};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use ts_rs::TS;

pub const MIN_RATE: f32 = 0.1;
pub const MAX_RATE: f32 = 10.0;
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PlaybackState {
    #[default]
    Idle,
    Speaking,
    Paused,
    Completed,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Speaking => "speaking",
            PlaybackState::Paused => "paused",
            PlaybackState::Completed => "completed",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportCommand {
    Play,
    Pause,
    Resume,
    Stop,
    Restart,
    SkipToEnd,
    TogglePlayPause,
    SetRate(f32),
    SetVoice(String),
}

impl TransportCommand {
    pub fn action(&self) -> &'static str {
        match self {
            Self::Play => "transport_play",
            Self::Pause => "transport_pause",
            Self::Resume => "transport_resume",
            Self::Stop => "transport_stop",
            Self::Restart => "transport_restart",
            Self::SkipToEnd => "transport_skip_to_end",
            Self::TogglePlayPause => "transport_toggle_play_pause",
            Self::SetRate(_) => "transport_set_rate",
            Self::SetVoice(_) => "transport_set_voice",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Command(TransportCommand),
    Speech(SpeechEvent),
    Tick,
    VoicesChanged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackOptions {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub tick_interval: Duration,
    /// Voice name requested by the user; wins over automatic selection.
    pub preferred_voice: Option<String>,
    pub estimator: EstimatorSettings,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            tick_interval: DEFAULT_TICK_INTERVAL,
            preferred_voice: None,
            estimator: EstimatorSettings::default(),
        }
    }
}

type CompletionCallback = Box<dyn FnMut()>;
type TickCallback = Box<dyn FnMut(&ProgressReport)>;

pub struct PlaybackController<E: SpeechEngine> {
    sections: Vec<Section>,
    options: PlaybackOptions,
    schedules: ScheduleCache,
    gateway: SpeechGateway<E>,
    voice: Option<Arc<Voice>>,
    state: PlaybackState,
    current_idx: Option<usize>,
    section_started_at: Option<Instant>,
    paused_at: Option<Instant>,
    ticking: bool,
    /// The engine finished a section while paused; the next one starts on resume.
    advance_on_resume: bool,
    revealed: usize,
    reporter: ProgressReporter,
    report: ProgressReport,
    completion_fired: bool,
    on_complete: Option<CompletionCallback>,
    on_tick: Option<TickCallback>,
}

impl<E: SpeechEngine> PlaybackController<E> {
    pub fn new(
        sections: Vec<Section>,
        engine: E,
        mut options: PlaybackOptions,
    ) -> Result<Self, PlaybackError> {
        validate_sections(&sections)?;
        options.rate = checked_rate(options.rate)?;
        options.estimator = options.estimator.sanitized();
        if options.tick_interval.is_zero() {
            options.tick_interval = DEFAULT_TICK_INTERVAL;
        }
        let mut schedules = ScheduleCache::default();
        schedules.get(&sections, options.rate, &options.estimator);
        Ok(Self {
            sections,
            options,
            schedules,
            gateway: SpeechGateway::new(engine),
            voice: None,
            state: PlaybackState::Idle,
            current_idx: None,
            section_started_at: None,
            paused_at: None,
            ticking: false,
            advance_on_resume: false,
            revealed: 0,
            reporter: ProgressReporter::default(),
            report: ProgressReport::idle(),
            completion_fired: false,
            on_complete: None,
            on_tick: None,
        })
    }

    /// Invoked once per run when narration completes or is skipped to the end.
    pub fn on_complete(mut self, callback: impl FnMut() + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Invoked after every progress tick while speaking.
    pub fn on_tick(mut self, callback: impl FnMut(&ProgressReport) + 'static) -> Self {
        self.on_tick = Some(Box::new(callback));
        self
    }

    pub fn handle(&mut self, event: PlaybackEvent, now: Instant) -> Result<(), PlaybackError> {
        match event {
            PlaybackEvent::Command(command) => self.apply_command(command, now),
            PlaybackEvent::Speech(event) => self.on_speech_event(event, now),
            PlaybackEvent::Tick => {
                self.tick(now);
                Ok(())
            }
            PlaybackEvent::VoicesChanged => {
                self.voices_changed();
                Ok(())
            }
        }
    }

    pub fn apply_command(
        &mut self,
        command: TransportCommand,
        now: Instant,
    ) -> Result<(), PlaybackError> {
        match command {
            TransportCommand::Play => self.play(now),
            TransportCommand::Pause => {
                self.pause(now);
                Ok(())
            }
            TransportCommand::Resume => self.resume(now),
            TransportCommand::Stop => {
                self.stop();
                Ok(())
            }
            TransportCommand::Restart => self.restart(now),
            TransportCommand::SkipToEnd => {
                self.skip_to_end();
                Ok(())
            }
            TransportCommand::TogglePlayPause => self.toggle_play_pause(now),
            TransportCommand::SetRate(rate) => self.set_rate(rate, now),
            TransportCommand::SetVoice(name) => self.set_voice(name),
        }
    }

    pub fn play(&mut self, now: Instant) -> Result<(), PlaybackError> {
        match self.state {
            PlaybackState::Speaking => {
                debug!("Play requested while already speaking");
                Ok(())
            }
            PlaybackState::Paused => self.resume(now),
            PlaybackState::Completed => self.restart(now),
            PlaybackState::Idle => {
                self.gateway.silence();
                self.start_run(now)
            }
        }
    }

    pub fn pause(&mut self, now: Instant) {
        if self.state != PlaybackState::Speaking {
            debug!(state = %self.state, "Ignoring pause outside of speaking state");
            return;
        }
        self.refresh(now);
        self.gateway.pause();
        self.paused_at = Some(now);
        self.ticking = false;
        self.state = PlaybackState::Paused;
        info!(
            section = self.current_idx.unwrap_or_default(),
            progress = self.report.progress_pct,
            "Narration paused"
        );
    }

    pub fn resume(&mut self, now: Instant) -> Result<(), PlaybackError> {
        if self.state != PlaybackState::Paused {
            debug!(state = %self.state, "Ignoring resume outside of paused state");
            return Ok(());
        }
        if let (Some(started), Some(paused)) = (self.section_started_at, self.paused_at) {
            self.section_started_at = Some(started + now.saturating_duration_since(paused));
        }
        self.paused_at = None;
        self.state = PlaybackState::Speaking;
        self.ticking = true;
        info!(
            section = self.current_idx.unwrap_or_default(),
            "Narration resumed"
        );
        if self.advance_on_resume {
            self.advance_on_resume = false;
            return self.advance(now);
        }
        self.gateway.resume();
        self.refresh(now);
        Ok(())
    }

    pub fn stop(&mut self) {
        self.gateway.cancel();
        self.reset_to_idle();
        info!("Narration stopped");
    }

    pub fn restart(&mut self, now: Instant) -> Result<(), PlaybackError> {
        info!("Restarting narration from the first section");
        self.gateway.silence();
        self.reset_to_idle();
        self.start_run(now)
    }

    pub fn skip_to_end(&mut self) {
        if self.state == PlaybackState::Completed {
            debug!("Skip to end requested after completion");
            return;
        }
        self.gateway.cancel();
        info!(
            from_section = self.current_idx.unwrap_or_default(),
            "Skipping to end of narration"
        );
        self.finish();
    }

    pub fn toggle_play_pause(&mut self, now: Instant) -> Result<(), PlaybackError> {
        match self.state {
            PlaybackState::Speaking => {
                self.pause(now);
                Ok(())
            }
            PlaybackState::Paused => self.resume(now),
            PlaybackState::Idle | PlaybackState::Completed => self.play(now),
        }
    }

    /// Change the speech rate and rebuild the schedule. A section that is
    /// being spoken is started over at the new rate; otherwise the rate
    /// applies from the next utterance.
    pub fn set_rate(&mut self, rate: f32, now: Instant) -> Result<(), PlaybackError> {
        let rate = checked_rate(rate)?;
        if (rate - self.options.rate).abs() <= f32::EPSILON {
            return Ok(());
        }
        self.options.rate = rate;
        self.schedules
            .get(&self.sections, rate, &self.options.estimator);
        info!(
            rate,
            total_secs = self.schedules.current().total_duration(),
            "Adjusted speech rate"
        );
        match (self.state, self.current_idx) {
            (PlaybackState::Speaking, Some(idx)) => self.begin_section(idx, now),
            _ => Ok(()),
        }
    }

    /// Pin a voice by name. With an empty catalog the request is kept and
    /// resolved once voices arrive.
    pub fn set_voice(&mut self, name: String) -> Result<(), PlaybackError> {
        let catalog = self.gateway.voices();
        if catalog.is_empty() {
            info!(voice = %name, "Voice catalog not loaded yet; keeping voice request");
            self.options.preferred_voice = Some(name);
            return Ok(());
        }
        let voice = find_by_name(&catalog, &name)
            .ok_or_else(|| PlaybackError::VoiceNotFound(name.clone()))?;
        info!(voice = %voice.name, lang = %voice.lang, "Voice selected by user");
        self.voice = Some(voice);
        self.options.preferred_voice = Some(name);
        Ok(())
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_section_idx(&self) -> Option<usize> {
        self.current_idx
    }

    pub fn progress_percent(&self) -> f64 {
        self.report.progress_pct
    }

    pub fn active_section_id(&self) -> Option<&str> {
        self.report.active_section_id.as_deref()
    }

    pub fn active_section_text(&self) -> &str {
        &self.report.active_section_text
    }

    pub fn report(&self) -> &ProgressReport {
        &self.report
    }

    /// Sections whose narration has begun; visual layers reveal this many.
    pub fn revealed_sections(&self) -> usize {
        self.revealed
    }

    /// Whether the host should be delivering [`PlaybackEvent::Tick`].
    pub fn is_ticking(&self) -> bool {
        self.ticking
    }

    pub fn tick_interval(&self) -> Duration {
        self.options.tick_interval
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn schedule(&self) -> &TimingSchedule {
        self.schedules.current()
    }

    pub fn rate(&self) -> f32 {
        self.options.rate
    }

    pub fn voice(&self) -> Option<&Arc<Voice>> {
        self.voice.as_ref()
    }

    pub fn current_utterance(&self) -> Option<UtteranceId> {
        self.gateway.current()
    }

    pub fn engine(&self) -> &E {
        self.gateway.engine()
    }

    pub fn engine_mut(&mut self) -> &mut E {
        self.gateway.engine_mut()
    }

    /// Time spent speaking the current section, paused time excluded.
    pub fn elapsed_in_section(&self, now: Instant) -> Duration {
        let reference = self.paused_at.unwrap_or(now);
        self.section_started_at
            .map(|started| reference.saturating_duration_since(started))
            .unwrap_or_default()
    }

    fn start_run(&mut self, now: Instant) -> Result<(), PlaybackError> {
        self.ensure_voice();
        self.completion_fired = false;
        self.advance_on_resume = false;
        self.revealed = 0;
        self.reporter.reset();
        if self.sections.is_empty() {
            info!("Presentation has no sections; completing immediately");
            self.finish();
            return Ok(());
        }
        info!(
            sections = self.sections.len(),
            rate = self.options.rate,
            voice = self.voice.as_ref().map(|voice| voice.name.as_str()).unwrap_or("engine default"),
            total_secs = self.schedules.current().total_duration(),
            "Starting narration"
        );
        self.begin_section(0, now)
    }

    fn begin_section(&mut self, idx: usize, now: Instant) -> Result<(), PlaybackError> {
        let options = self.speak_options();
        self.current_idx = Some(idx);
        self.section_started_at = Some(now);
        self.paused_at = None;
        self.revealed = self.revealed.max(idx + 1);
        self.state = PlaybackState::Speaking;

        let section = &self.sections[idx];
        match self.gateway.begin(&section.text, &options) {
            Ok(utterance) => {
                debug!(section = %section.id, idx, utterance, "Speaking section");
                self.ticking = true;
                self.refresh(now);
                Ok(())
            }
            Err(error) => {
                let section_id = section.id.clone();
                Err(self.fail(section_id, error))
            }
        }
    }

    /// Move past the current section: next utterance, or completion.
    fn advance(&mut self, now: Instant) -> Result<(), PlaybackError> {
        let next = self.current_idx.map_or(0, |idx| idx + 1);
        if next >= self.sections.len() {
            self.finish();
            Ok(())
        } else {
            self.begin_section(next, now)
        }
    }

    fn finish(&mut self) {
        self.state = PlaybackState::Completed;
        self.ticking = false;
        self.advance_on_resume = false;
        self.section_started_at = None;
        self.paused_at = None;
        self.current_idx = self.sections.len().checked_sub(1);
        self.revealed = self.sections.len();
        self.report = self.reporter.completed(self.current_idx);
        if self.completion_fired {
            return;
        }
        self.completion_fired = true;
        info!("Narration complete");
        if let Some(callback) = self.on_complete.as_mut() {
            callback();
        }
    }

    fn fail(&mut self, section: String, error: SpeechError) -> PlaybackError {
        warn!(%section, %error, "Narration failed; returning to idle");
        self.reset_to_idle();
        PlaybackError::Engine {
            section,
            source: error,
        }
    }

    fn reset_to_idle(&mut self) {
        self.state = PlaybackState::Idle;
        self.current_idx = None;
        self.section_started_at = None;
        self.paused_at = None;
        self.ticking = false;
        self.advance_on_resume = false;
        self.revealed = 0;
        self.reporter.reset();
        self.report = ProgressReport::idle();
    }

    fn on_speech_event(&mut self, event: SpeechEvent, now: Instant) -> Result<(), PlaybackError> {
        if !self.gateway.is_current(event.utterance) {
            debug!(
                utterance = event.utterance,
                current = ?self.gateway.current(),
                kind = ?event.kind,
                "Ignoring stale speech event"
            );
            return Ok(());
        }
        match event.kind {
            SpeechEventKind::Start => {
                self.on_utterance_start(now);
                Ok(())
            }
            SpeechEventKind::End => self.on_utterance_end(event.utterance, now),
            SpeechEventKind::Error(error) => self.on_utterance_error(event.utterance, error),
        }
    }

    fn on_utterance_start(&mut self, now: Instant) {
        match self.state {
            PlaybackState::Speaking => {
                self.section_started_at = Some(now);
                self.ticking = true;
                self.refresh(now);
            }
            // Started while paused: count the section from the resume instant.
            PlaybackState::Paused => self.section_started_at = self.paused_at,
            PlaybackState::Idle | PlaybackState::Completed => {}
        }
    }

    fn on_utterance_end(&mut self, utterance: UtteranceId, now: Instant) -> Result<(), PlaybackError> {
        self.gateway.release(utterance);
        debug!(
            utterance,
            section = self.current_idx.unwrap_or_default(),
            "Section finished"
        );
        if self.state == PlaybackState::Paused {
            self.advance_on_resume = true;
            return Ok(());
        }
        self.advance(now)
    }

    fn on_utterance_error(
        &mut self,
        utterance: UtteranceId,
        error: SpeechError,
    ) -> Result<(), PlaybackError> {
        self.gateway.release(utterance);
        if error.is_superseded() {
            // Our own cancels drop the utterance first, so another speaker
            // silenced the engine. No `end` will follow.
            info!(utterance, reason = %error.reason, "Narration interrupted by another speaker");
            self.reset_to_idle();
            return Ok(());
        }
        let section = self
            .current_idx
            .and_then(|idx| self.sections.get(idx))
            .map(|section| section.id.clone())
            .unwrap_or_default();
        Err(self.fail(section, error))
    }

    /// Refresh progress; does nothing unless speaking.
    pub fn tick(&mut self, now: Instant) {
        if !self.ticking || self.state != PlaybackState::Speaking {
            return;
        }
        self.refresh(now);
        if let Some(callback) = self.on_tick.as_mut() {
            callback(&self.report);
        }
    }

    fn refresh(&mut self, now: Instant) {
        let Some(idx) = self.current_idx else {
            return;
        };
        let elapsed = self.elapsed_in_section(now);
        self.report = self
            .reporter
            .report(&self.sections, self.schedules.current(), idx, elapsed);
    }

    /// Re-evaluate the voice after the engine's catalog changed.
    pub fn voices_changed(&mut self) {
        let catalog = self.gateway.voices();
        if let Some(current) = &self.voice {
            if catalog.iter().any(|voice| voice.name == current.name) {
                return;
            }
            warn!(voice = %current.name, "Selected voice left the catalog; choosing again");
            self.voice = None;
        }
        self.ensure_voice();
    }

    fn ensure_voice(&mut self) {
        if self.voice.is_some() {
            return;
        }
        let catalog = self.gateway.voices();
        if catalog.is_empty() {
            debug!("Voice catalog is empty; using the engine default voice");
            return;
        }
        if let Some(name) = self.options.preferred_voice.as_deref() {
            if let Some(voice) = find_by_name(&catalog, name) {
                debug!(voice = %voice.name, "Using preferred voice");
                self.voice = Some(voice);
                return;
            }
            warn!(voice = %name, "Preferred voice is not in the catalog; selecting automatically");
        }
        self.voice = select_best(&catalog);
    }

    fn speak_options(&self) -> SpeakOptions {
        SpeakOptions {
            rate: self.options.rate,
            pitch: self.options.pitch,
            volume: self.options.volume,
            voice: self.voice.clone(),
        }
    }
}

impl<E: SpeechEngine> Drop for PlaybackController<E> {
    fn drop(&mut self) {
        if self.gateway.current().is_some() {
            debug!("Playback controller dropped mid-utterance; cancelling speech");
            self.gateway.cancel();
        }
    }
}

fn checked_rate(rate: f32) -> Result<f32, PlaybackError> {
    if rate.is_finite() && rate > 0.0 {
        Ok(rate.clamp(MIN_RATE, MAX_RATE))
    } else {
        Err(PlaybackError::InvalidRate(rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::SpeechErrorReason;
    use crate::testing::{EngineCall, RecordingEngine};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn sections() -> Vec<Section> {
        vec![
            Section::new("a", "One two three."),
            Section::new("b", "Four five six seven. Eight nine."),
            Section::new("c", "Ten eleven."),
        ]
    }

    fn controller(engine: RecordingEngine) -> PlaybackController<RecordingEngine> {
        PlaybackController::new(sections(), engine, PlaybackOptions::default()).unwrap()
    }

    fn utterance(ctrl: &PlaybackController<RecordingEngine>) -> UtteranceId {
        ctrl.current_utterance().expect("an utterance should be active")
    }

    fn end_current(ctrl: &mut PlaybackController<RecordingEngine>, now: Instant) {
        let id = utterance(ctrl);
        ctrl.handle(PlaybackEvent::Speech(SpeechEvent::end(id)), now).unwrap();
    }

    #[test]
    fn play_silences_engine_then_speaks_first_section() {
        let mut ctrl = controller(RecordingEngine::default());
        let now = Instant::now();

        ctrl.play(now).unwrap();

        assert_eq!(ctrl.state(), PlaybackState::Speaking);
        assert_eq!(ctrl.current_section_idx(), Some(0));
        assert!(ctrl.is_ticking());
        assert_eq!(ctrl.revealed_sections(), 1);
        let id = utterance(&ctrl);
        assert_eq!(
            ctrl.engine().calls,
            vec![EngineCall::Cancel, EngineCall::Speak(id, "One two three.".to_string())]
        );
        assert_eq!(ctrl.active_section_id(), Some("a"));
    }

    #[test]
    fn end_events_walk_sections_and_complete_once() {
        let fired = Rc::new(Cell::new(0));
        let counter = Rc::clone(&fired);
        let mut ctrl = controller(RecordingEngine::default())
            .on_complete(move || counter.set(counter.get() + 1));
        let now = Instant::now();
        ctrl.play(now).unwrap();

        end_current(&mut ctrl, now + Duration::from_secs(2));
        assert_eq!(ctrl.current_section_idx(), Some(1));
        end_current(&mut ctrl, now + Duration::from_secs(5));
        assert_eq!(ctrl.current_section_idx(), Some(2));
        end_current(&mut ctrl, now + Duration::from_secs(7));

        assert_eq!(ctrl.state(), PlaybackState::Completed);
        assert_eq!(ctrl.progress_percent(), 100.0);
        assert!(!ctrl.is_ticking());
        assert_eq!(fired.get(), 1);
        assert_eq!(ctrl.revealed_sections(), 3);
        // Natural advancement never needs to cancel anything.
        assert_eq!(ctrl.engine().count(&EngineCall::Cancel), 1);

        ctrl.skip_to_end();
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn stale_end_event_leaves_state_untouched() {
        let mut ctrl = controller(RecordingEngine::default());
        let now = Instant::now();
        ctrl.play(now).unwrap();
        let current = utterance(&ctrl);

        ctrl.handle(PlaybackEvent::Speech(SpeechEvent::end(current + 41)), now).unwrap();

        assert_eq!(ctrl.state(), PlaybackState::Speaking);
        assert_eq!(ctrl.current_section_idx(), Some(0));
        assert_eq!(ctrl.current_utterance(), Some(current));
        assert_eq!(ctrl.engine().spoken().len(), 1);
    }

    #[test]
    fn late_end_for_replaced_utterance_is_ignored() {
        let mut ctrl = controller(RecordingEngine::default());
        let now = Instant::now();
        ctrl.play(now).unwrap();
        let first = utterance(&ctrl);
        ctrl.set_rate(1.5, now + Duration::from_millis(300)).unwrap();
        let replacement = utterance(&ctrl);
        assert_ne!(first, replacement);

        ctrl.handle(PlaybackEvent::Speech(SpeechEvent::end(first)), now + Duration::from_secs(1))
            .unwrap();

        assert_eq!(ctrl.current_section_idx(), Some(0));
        assert_eq!(ctrl.current_utterance(), Some(replacement));
    }

    #[test]
    fn replacing_an_active_utterance_cancels_exactly_once() {
        let mut ctrl = controller(RecordingEngine::default());
        let now = Instant::now();
        ctrl.play(now).unwrap();
        let before = ctrl.engine().calls.len();

        ctrl.set_rate(2.0, now).unwrap();

        let id = utterance(&ctrl);
        assert_eq!(
            ctrl.engine().calls[before..].to_vec(),
            vec![EngineCall::Cancel, EngineCall::Speak(id, "One two three.".to_string())]
        );
    }

    #[test]
    fn pause_resume_pair_keeps_progress_unchanged() {
        let mut ctrl = controller(RecordingEngine::default());
        let t0 = Instant::now();
        ctrl.play(t0).unwrap();
        ctrl.handle(PlaybackEvent::Tick, t0 + Duration::from_millis(700)).unwrap();

        let pause_at = t0 + Duration::from_millis(900);
        ctrl.pause(pause_at);
        let before = ctrl.progress_percent();
        assert!(!ctrl.is_ticking());

        // Ticks while paused change nothing.
        ctrl.handle(PlaybackEvent::Tick, pause_at + Duration::from_secs(3)).unwrap();
        assert_eq!(ctrl.progress_percent(), before);

        let resume_at = pause_at + Duration::from_secs(30);
        ctrl.resume(resume_at).unwrap();
        ctrl.handle(PlaybackEvent::Tick, resume_at).unwrap();

        assert_eq!(ctrl.progress_percent(), before);
        assert_eq!(ctrl.elapsed_in_section(resume_at), Duration::from_millis(900));
        assert!(ctrl.engine().calls.contains(&EngineCall::Pause));
        assert!(ctrl.engine().calls.contains(&EngineCall::Resume));
    }

    #[test]
    fn restart_resets_index_and_subtitle() {
        let mut ctrl = controller(RecordingEngine::default());
        let now = Instant::now();
        ctrl.play(now).unwrap();
        end_current(&mut ctrl, now + Duration::from_secs(2));
        ctrl.handle(PlaybackEvent::Tick, now + Duration::from_secs(3)).unwrap();
        assert_eq!(ctrl.active_section_id(), Some("b"));
        let stale_progress = ctrl.progress_percent();

        let restart_at = now + Duration::from_secs(4);
        ctrl.restart(restart_at).unwrap();
        let id = utterance(&ctrl);
        ctrl.handle(PlaybackEvent::Speech(SpeechEvent::start(id)), restart_at).unwrap();

        assert_eq!(ctrl.current_section_idx(), Some(0));
        assert_eq!(ctrl.revealed_sections(), 1);
        assert_eq!(ctrl.active_section_id(), Some("a"));
        assert_eq!(ctrl.active_section_text(), "One two three.");
        assert!(ctrl.progress_percent() < stale_progress);
    }

    #[test]
    fn skip_to_end_fires_completion_and_cancels() {
        let fired = Rc::new(Cell::new(0));
        let counter = Rc::clone(&fired);
        let mut ctrl = controller(RecordingEngine::default())
            .on_complete(move || counter.set(counter.get() + 1));
        let now = Instant::now();
        ctrl.play(now).unwrap();

        ctrl.skip_to_end();
        ctrl.skip_to_end();

        assert_eq!(ctrl.state(), PlaybackState::Completed);
        assert_eq!(ctrl.progress_percent(), 100.0);
        assert_eq!(ctrl.active_section_text(), "");
        assert_eq!(fired.get(), 1);
        assert_eq!(ctrl.current_utterance(), None);
        assert_eq!(ctrl.engine().count(&EngineCall::Cancel), 2);
    }

    #[test]
    fn stop_resets_everything() {
        let mut ctrl = controller(RecordingEngine::default());
        let now = Instant::now();
        ctrl.play(now).unwrap();
        ctrl.handle(PlaybackEvent::Tick, now + Duration::from_secs(1)).unwrap();

        ctrl.stop();

        assert_eq!(ctrl.state(), PlaybackState::Idle);
        assert_eq!(ctrl.current_section_idx(), None);
        assert_eq!(ctrl.progress_percent(), 0.0);
        assert_eq!(ctrl.revealed_sections(), 0);
        assert!(!ctrl.is_ticking());
        assert_eq!(ctrl.active_section_id(), None);
    }

    #[test]
    fn interruption_by_another_speaker_goes_idle_quietly() {
        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        let mut ctrl = controller(RecordingEngine::default()).on_complete(move || flag.set(true));
        let now = Instant::now();
        ctrl.play(now).unwrap();
        let id = utterance(&ctrl);
        let interrupted = SpeechError::new(SpeechErrorReason::Interrupted);

        let result = ctrl.handle(PlaybackEvent::Speech(SpeechEvent::error(id, interrupted)), now);
        for secs in 1..=600 {
            ctrl.handle(PlaybackEvent::Tick, now + Duration::from_secs(secs)).unwrap();
        }

        assert!(result.is_ok());
        assert_eq!(ctrl.state(), PlaybackState::Idle);
        assert_eq!(ctrl.current_utterance(), None);
        assert_eq!(ctrl.current_section_idx(), None);
        assert!(!ctrl.is_ticking());
        assert_eq!(ctrl.progress_percent(), 0.0);
        assert!(!fired.get());
        // The engine already dropped the utterance; nothing left to cancel.
        assert_eq!(ctrl.engine().count(&EngineCall::Cancel), 1);

        ctrl.play(now + Duration::from_secs(601)).unwrap();
        assert_eq!(ctrl.state(), PlaybackState::Speaking);
        assert_eq!(ctrl.current_section_idx(), Some(0));
    }

    #[test]
    fn cancel_error_for_a_replaced_utterance_is_ignored() {
        let mut ctrl = controller(RecordingEngine::default());
        let now = Instant::now();
        ctrl.play(now).unwrap();
        let first = utterance(&ctrl);
        ctrl.set_rate(1.5, now).unwrap();
        let canceled = SpeechError::new(SpeechErrorReason::Canceled);

        let result = ctrl.handle(PlaybackEvent::Speech(SpeechEvent::error(first, canceled)), now);

        assert!(result.is_ok());
        assert_eq!(ctrl.state(), PlaybackState::Speaking);
        assert_ne!(ctrl.current_utterance(), Some(first));
    }

    #[test]
    fn genuine_engine_error_surfaces_once_and_goes_idle() {
        let mut ctrl = controller(RecordingEngine::default());
        let now = Instant::now();
        ctrl.play(now).unwrap();
        let id = utterance(&ctrl);
        let failure = SpeechEvent::error(id, SpeechError::new(SpeechErrorReason::SynthesisFailed));

        let first = ctrl.handle(PlaybackEvent::Speech(failure.clone()), now);
        let repeated = ctrl.handle(PlaybackEvent::Speech(failure), now);
        ctrl.stop();

        assert!(matches!(first, Err(PlaybackError::Engine { ref section, .. }) if section == "a"));
        assert!(repeated.is_ok());
        assert_eq!(ctrl.state(), PlaybackState::Idle);
        // The dead utterance is not cancelled by the follow-up stop.
        assert_eq!(ctrl.engine().count(&EngineCall::Cancel), 1);
    }

    #[test]
    fn synchronous_refusal_is_reported_as_engine_error() {
        let mut engine = RecordingEngine::default();
        engine.refuse_with = Some(SpeechError::new(SpeechErrorReason::SynthesisUnavailable));
        let mut ctrl = controller(engine);

        let result = ctrl.play(Instant::now());

        assert!(matches!(result, Err(PlaybackError::Engine { .. })));
        assert_eq!(ctrl.state(), PlaybackState::Idle);
        assert_eq!(ctrl.current_utterance(), None);
    }

    #[test]
    fn end_while_paused_waits_for_resume() {
        let mut ctrl = controller(RecordingEngine::default());
        let now = Instant::now();
        ctrl.play(now).unwrap();
        ctrl.pause(now + Duration::from_secs(1));

        end_current(&mut ctrl, now + Duration::from_secs(2));
        assert_eq!(ctrl.state(), PlaybackState::Paused);
        assert_eq!(ctrl.current_section_idx(), Some(0));
        assert_eq!(ctrl.engine().spoken().len(), 1);

        ctrl.resume(now + Duration::from_secs(3)).unwrap();
        assert_eq!(ctrl.current_section_idx(), Some(1));
        assert_eq!(ctrl.engine().spoken().len(), 2);
        assert!(!ctrl.engine().calls.contains(&EngineCall::Resume));
    }

    #[test]
    fn tick_callback_only_runs_while_speaking() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut ctrl = controller(RecordingEngine::default())
            .on_tick(move |report| sink.borrow_mut().push(report.progress_pct));
        let now = Instant::now();

        ctrl.handle(PlaybackEvent::Tick, now).unwrap();
        ctrl.play(now).unwrap();
        ctrl.handle(PlaybackEvent::Tick, now + Duration::from_millis(100)).unwrap();
        ctrl.handle(PlaybackEvent::Tick, now + Duration::from_millis(200)).unwrap();
        ctrl.pause(now + Duration::from_millis(250));
        ctrl.handle(PlaybackEvent::Tick, now + Duration::from_millis(300)).unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert!(seen[0] <= seen[1]);
    }

    #[test]
    fn tick_never_reports_beyond_the_current_section() {
        let mut ctrl = controller(RecordingEngine::default());
        let now = Instant::now();
        ctrl.play(now).unwrap();

        ctrl.handle(PlaybackEvent::Tick, now + Duration::from_secs(120)).unwrap();

        let first = ctrl.schedule().entry(0).unwrap().clone();
        let cap = 100.0 * first.end_offset() / ctrl.schedule().total_duration();
        assert_eq!(ctrl.report().section_idx, Some(0));
        assert!((ctrl.progress_percent() - cap).abs() < 1e-9);
    }

    #[test]
    fn voice_is_selected_when_catalog_arrives_late() {
        let mut ctrl = controller(RecordingEngine::default());
        let now = Instant::now();
        ctrl.play(now).unwrap();
        assert!(ctrl.voice().is_none());

        ctrl.engine_mut().catalog = vec![
            Arc::new(Voice::new("Samantha", "en-US").local()),
            Arc::new(Voice::new("Google US English", "en-US")),
        ];
        ctrl.handle(PlaybackEvent::VoicesChanged, now).unwrap();
        end_current(&mut ctrl, now + Duration::from_secs(2));

        assert_eq!(ctrl.voice().map(|voice| voice.name.as_str()), Some("Google US English"));
        let options = ctrl.engine().last_options.clone().unwrap();
        assert_eq!(options.voice.map(|voice| voice.name.clone()).as_deref(), Some("Google US English"));
    }

    #[test]
    fn pending_voice_request_resolves_when_catalog_loads() {
        let mut ctrl = controller(RecordingEngine::default());
        ctrl.set_voice("Samantha".to_string()).unwrap();
        assert!(ctrl.voice().is_none());

        ctrl.engine_mut().catalog = vec![
            Arc::new(Voice::new("Google US English", "en-US")),
            Arc::new(Voice::new("Samantha", "en-US").local()),
        ];
        ctrl.handle(PlaybackEvent::VoicesChanged, Instant::now()).unwrap();

        assert_eq!(ctrl.voice().map(|voice| voice.name.as_str()), Some("Samantha"));
    }

    #[test]
    fn unknown_voice_is_rejected_when_catalog_is_loaded() {
        let engine = RecordingEngine::with_voices(vec![Voice::new("Moira", "en-IE")]);
        let mut ctrl = controller(engine);

        let result = ctrl.set_voice("Nobody".to_string());

        assert_eq!(result, Err(PlaybackError::VoiceNotFound("Nobody".to_string())));
    }

    #[test]
    fn invalid_rates_are_rejected_and_extremes_clamped() {
        let mut ctrl = controller(RecordingEngine::default());
        let now = Instant::now();

        assert_eq!(ctrl.set_rate(0.0, now), Err(PlaybackError::InvalidRate(0.0)));
        ctrl.set_rate(50.0, now).unwrap();
        assert_eq!(ctrl.rate(), MAX_RATE);

        let options = PlaybackOptions {
            rate: -1.0,
            ..PlaybackOptions::default()
        };
        assert!(PlaybackController::new(sections(), RecordingEngine::default(), options).is_err());
    }

    #[test]
    fn toggle_cycles_through_play_pause_resume() {
        let mut ctrl = controller(RecordingEngine::default());
        let now = Instant::now();

        ctrl.apply_command(TransportCommand::TogglePlayPause, now).unwrap();
        assert_eq!(ctrl.state(), PlaybackState::Speaking);
        ctrl.apply_command(TransportCommand::TogglePlayPause, now).unwrap();
        assert_eq!(ctrl.state(), PlaybackState::Paused);
        ctrl.apply_command(TransportCommand::TogglePlayPause, now).unwrap();
        assert_eq!(ctrl.state(), PlaybackState::Speaking);
    }

    #[test]
    fn empty_presentation_completes_on_play() {
        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        let mut ctrl =
            PlaybackController::new(Vec::new(), RecordingEngine::default(), PlaybackOptions::default())
                .unwrap()
            .on_complete(move || flag.set(true));

        ctrl.play(Instant::now()).unwrap();

        assert_eq!(ctrl.state(), PlaybackState::Completed);
        assert_eq!(ctrl.current_section_idx(), None);
        assert!(fired.get());
    }

    #[test]
    fn dropping_mid_utterance_cancels_speech() {
        let engine = Rc::new(RefCell::new(RecordingEngine::default()));
        {
            let mut ctrl =
                PlaybackController::new(sections(), Rc::clone(&engine), PlaybackOptions::default()).unwrap();
            ctrl.play(Instant::now()).unwrap();
        }
        let calls = engine.borrow().calls.clone();
        assert_eq!(calls.last(), Some(&EngineCall::Cancel));
    }
}
