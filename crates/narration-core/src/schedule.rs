//! Section timing: per-section estimated durations and cumulative offsets.

use crate::error::PlaybackError;
use crate::estimator::EstimatorSettings;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// One narrated unit of a presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub text: String,
}

impl Section {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Reject section lists whose ids are not unique.
pub fn validate_sections(sections: &[Section]) -> Result<(), PlaybackError> {
    let mut seen = HashSet::new();
    for section in sections {
        if !seen.insert(section.id.as_str()) {
            return Err(PlaybackError::DuplicateSectionId(section.id.clone()));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
    pub id: String,
    pub start_offset: f64,
    pub duration: f64,
}

impl ScheduleEntry {
    pub fn end_offset(&self) -> f64 {
        self.start_offset + self.duration
    }
}

/// Estimated timeline of a presentation, in seconds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimingSchedule {
    entries: Vec<ScheduleEntry>,
    index: HashMap<String, usize>,
    total_duration: f64,
}

impl TimingSchedule {
    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn entry(&self, idx: usize) -> Option<&ScheduleEntry> {
        self.entries.get(idx)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn duration_of(&self, id: &str) -> Option<f64> {
        self.index.get(id).map(|&idx| self.entries[idx].duration)
    }

    pub fn start_offset_of(&self, id: &str) -> Option<f64> {
        self.index.get(id).map(|&idx| self.entries[idx].start_offset)
    }
}

/// Build the timeline for `sections` in author order.
pub fn schedule(sections: &[Section], rate: f32, estimator: &EstimatorSettings) -> TimingSchedule {
    let mut entries = Vec::with_capacity(sections.len());
    let mut index = HashMap::with_capacity(sections.len());
    let mut offset = 0.0;
    for (idx, section) in sections.iter().enumerate() {
        let duration = estimator.estimate(&section.text, rate);
        entries.push(ScheduleEntry {
            id: section.id.clone(),
            start_offset: offset,
            duration,
        });
        index.insert(section.id.clone(), idx);
        offset += duration;
    }
    debug!(
        sections = entries.len(),
        rate,
        total_secs = offset,
        "Computed narration schedule"
    );
    TimingSchedule {
        entries,
        index,
        total_duration: offset,
    }
}

/// Keeps the last computed schedule and recomputes only when the sections,
/// rate or estimator constants change.
#[derive(Debug, Default)]
pub struct ScheduleCache {
    fingerprint: Option<String>,
    schedule: TimingSchedule,
}

impl ScheduleCache {
    pub fn get(
        &mut self,
        sections: &[Section],
        rate: f32,
        estimator: &EstimatorSettings,
    ) -> &TimingSchedule {
        let key = fingerprint(sections, rate, estimator);
        if self.fingerprint.as_deref() != Some(key.as_str()) {
            self.schedule = schedule(sections, rate, estimator);
            self.fingerprint = Some(key);
        } else {
            debug!("Reusing cached narration schedule");
        }
        &self.schedule
    }

    pub fn current(&self) -> &TimingSchedule {
        &self.schedule
    }
}

fn fingerprint(sections: &[Section], rate: f32, estimator: &EstimatorSettings) -> String {
    let mut hasher = Sha256::new();
    hasher.update(rate.to_le_bytes());
    for value in [
        estimator.words_per_second,
        estimator.chars_per_second,
        estimator.sentence_pause_secs,
        estimator.clause_pause_secs,
        estimator.min_duration_secs,
    ] {
        hasher.update(value.to_le_bytes());
    }
    for section in sections {
        hasher.update((section.id.len() as u64).to_le_bytes());
        hasher.update(section.id.as_bytes());
        hasher.update((section.text.len() as u64).to_le_bytes());
        hasher.update(section.text.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
