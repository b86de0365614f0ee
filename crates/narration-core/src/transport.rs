//! User-facing transport: commands in, view snapshots out.
//!
//! Hosts drive a [`Transport`] from their UI and event loop. Every command
//! produces a [`TransportEvent`] carrying the action name and a fresh
//! [`TransportView`]; subscribers additionally hear about every view change,
//! including those caused by engine events and ticks.

use crate::controller::{PlaybackController, PlaybackEvent, PlaybackState, TransportCommand};
use crate::error::PlaybackError;
use crate::speech::{SpeechEngine, SpeechEvent};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, warn};
use ts_rs::TS;

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct TransportView {
    pub state: PlaybackState,
    pub progress_pct: f64,
    pub current_section_idx: Option<usize>,
    pub active_section_id: Option<String>,
    pub active_section_text: String,
    pub section_count: usize,
    pub revealed_sections: usize,
    pub total_duration_secs: f64,
    pub rate: f32,
    pub voice_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct TransportEvent {
    #[ts(type = "number")]
    pub request_id: u64,
    pub action: String,
    pub view: TransportView,
}

type ViewSubscriber = Box<dyn FnMut(&TransportView)>;

pub struct Transport<E: SpeechEngine> {
    controller: PlaybackController<E>,
    subscribers: Vec<ViewSubscriber>,
    last_view: TransportView,
    next_request_id: u64,
}

impl<E: SpeechEngine> Transport<E> {
    pub fn new(controller: PlaybackController<E>) -> Self {
        let last_view = view_of(&controller);
        Self {
            controller,
            subscribers: Vec::new(),
            last_view,
            next_request_id: 1,
        }
    }

    /// Register an observer for view changes. It is not called for the
    /// current view, only for the next change.
    pub fn subscribe(&mut self, subscriber: impl FnMut(&TransportView) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    pub fn play(&mut self) -> Result<TransportEvent, PlaybackError> {
        self.dispatch(TransportCommand::Play)
    }

    pub fn pause(&mut self) -> Result<TransportEvent, PlaybackError> {
        self.dispatch(TransportCommand::Pause)
    }

    pub fn resume(&mut self) -> Result<TransportEvent, PlaybackError> {
        self.dispatch(TransportCommand::Resume)
    }

    pub fn stop(&mut self) -> Result<TransportEvent, PlaybackError> {
        self.dispatch(TransportCommand::Stop)
    }

    pub fn restart(&mut self) -> Result<TransportEvent, PlaybackError> {
        self.dispatch(TransportCommand::Restart)
    }

    pub fn skip_to_end(&mut self) -> Result<TransportEvent, PlaybackError> {
        self.dispatch(TransportCommand::SkipToEnd)
    }

    pub fn toggle_play_pause(&mut self) -> Result<TransportEvent, PlaybackError> {
        self.dispatch(TransportCommand::TogglePlayPause)
    }

    pub fn dispatch(&mut self, command: TransportCommand) -> Result<TransportEvent, PlaybackError> {
        self.dispatch_at(command, Instant::now())
    }

    pub fn dispatch_at(
        &mut self,
        command: TransportCommand,
        now: Instant,
    ) -> Result<TransportEvent, PlaybackError> {
        let request_id = self.allocate_request_id();
        let action = command.action();
        debug!(request_id, action, "Dispatching transport command");
        let result = self.controller.apply_command(command, now);
        self.publish();
        match result {
            Ok(()) => Ok(TransportEvent {
                request_id,
                action: action.to_string(),
                view: self.last_view.clone(),
            }),
            Err(err) => {
                warn!(request_id, action, %err, "Transport command failed");
                Err(err)
            }
        }
    }

    pub fn on_speech_event(&mut self, event: SpeechEvent, now: Instant) -> Result<(), PlaybackError> {
        let result = self.controller.handle(PlaybackEvent::Speech(event), now);
        self.publish();
        result
    }

    pub fn tick(&mut self, now: Instant) {
        if !self.controller.is_ticking() {
            return;
        }
        self.controller.tick(now);
        self.publish();
    }

    pub fn voices_changed(&mut self) {
        self.controller.voices_changed();
        self.publish();
    }

    pub fn view(&self) -> &TransportView {
        &self.last_view
    }

    pub fn controller(&self) -> &PlaybackController<E> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PlaybackController<E> {
        &mut self.controller
    }

    fn publish(&mut self) {
        let view = view_of(&self.controller);
        if view == self.last_view {
            return;
        }
        self.last_view = view;
        for subscriber in &mut self.subscribers {
            subscriber(&self.last_view);
        }
    }

    fn allocate_request_id(&mut self) -> u64 {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1).max(1);
        request_id
    }
}

fn view_of<E: SpeechEngine>(controller: &PlaybackController<E>) -> TransportView {
    let report = controller.report();
    TransportView {
        state: controller.state(),
        progress_pct: report.progress_pct,
        current_section_idx: controller.current_section_idx(),
        active_section_id: report.active_section_id.clone(),
        active_section_text: report.active_section_text.clone(),
        section_count: controller.sections().len(),
        revealed_sections: controller.revealed_sections(),
        total_duration_secs: controller.schedule().total_duration(),
        rate: controller.rate(),
        voice_name: controller.voice().map(|voice| voice.name.clone()),
    }
}
