//! Overall completion and subtitle tracking derived from the schedule.

use crate::schedule::{Section, TimingSchedule};
use crate::text_utils::{count_words, split_sentences};
use serde::Serialize;
use std::time::Duration;
use ts_rs::TS;

/// What observers render on each tick.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct ProgressReport {
    pub progress_pct: f64,
    pub section_idx: Option<usize>,
    pub active_section_id: Option<String>,
    pub active_section_text: String,
}

impl ProgressReport {
    pub fn idle() -> Self {
        Self {
            progress_pct: 0.0,
            section_idx: None,
            active_section_id: None,
            active_section_text: String::new(),
        }
    }

    pub fn completed(section_idx: Option<usize>) -> Self {
        Self {
            progress_pct: 100.0,
            section_idx,
            active_section_id: None,
            active_section_text: String::new(),
        }
    }
}

/// `100 × (start + min(elapsed, duration)) / total`, clamped to [0, 100].
pub fn progress_percent(schedule: &TimingSchedule, section_idx: usize, elapsed: Duration) -> f64 {
    let total = schedule.total_duration();
    let Some(entry) = schedule.entry(section_idx) else {
        return 0.0;
    };
    if total <= 0.0 {
        return 0.0;
    }
    let within = elapsed.as_secs_f64().min(entry.duration);
    (100.0 * (entry.start_offset + within) / total).clamp(0.0, 100.0)
}

/// Sentences of one section with each sentence's share of the section's
/// words, accumulated so lookups are a binary search.
#[derive(Debug, Clone)]
struct SentenceBreakdown {
    sentences: Vec<String>,
    cumulative_share: Vec<f64>,
}

impl SentenceBreakdown {
    fn new(text: &str) -> Self {
        let sentences = split_sentences(text);
        let weights: Vec<usize> = sentences.iter().map(|s| count_words(s)).collect();
        let total: usize = weights.iter().sum();
        if total == 0 {
            let whole = text.trim().to_string();
            return Self {
                sentences: vec![whole],
                cumulative_share: vec![1.0],
            };
        }
        let mut acc = 0usize;
        let cumulative_share = weights
            .iter()
            .map(|weight| {
                acc += weight;
                acc as f64 / total as f64
            })
            .collect();
        Self {
            sentences,
            cumulative_share,
        }
    }

    fn sentence_at(&self, fraction: f64) -> &str {
        let idx = self
            .cumulative_share
            .partition_point(|share| *share <= fraction)
            .min(self.sentences.len().saturating_sub(1));
        self.sentences.get(idx).map(String::as_str).unwrap_or_default()
    }
}

/// Turns elapsed section time into observer-facing reports.
///
/// Reported progress never decreases until [`ProgressReporter::reset`]; a
/// late engine `start` that restarts the section clock would otherwise make
/// the bar jump backwards.
#[derive(Debug, Default)]
pub struct ProgressReporter {
    floor: f64,
    breakdown: Option<(usize, SentenceBreakdown)>,
}

impl ProgressReporter {
    pub fn report(
        &mut self,
        sections: &[Section],
        schedule: &TimingSchedule,
        section_idx: usize,
        elapsed: Duration,
    ) -> ProgressReport {
        let Some(section) = sections.get(section_idx) else {
            return ProgressReport::idle();
        };
        let computed = progress_percent(schedule, section_idx, elapsed);
        self.floor = self.floor.max(computed);

        let fraction = schedule
            .entry(section_idx)
            .filter(|entry| entry.duration > 0.0)
            .map(|entry| (elapsed.as_secs_f64() / entry.duration).clamp(0.0, 1.0))
            .unwrap_or(0.0);
        if self.breakdown.as_ref().map(|(idx, _)| *idx) != Some(section_idx) {
            self.breakdown = Some((section_idx, SentenceBreakdown::new(&section.text)));
        }
        let active_section_text = self
            .breakdown
            .as_ref()
            .map(|(_, breakdown)| breakdown.sentence_at(fraction).to_string())
            .unwrap_or_default();

        ProgressReport {
            progress_pct: self.floor,
            section_idx: Some(section_idx),
            active_section_id: Some(section.id.clone()),
            active_section_text,
        }
    }

    pub fn completed(&mut self, section_idx: Option<usize>) -> ProgressReport {
        self.floor = 100.0;
        self.breakdown = None;
        ProgressReport::completed(section_idx)
    }

    pub fn reset(&mut self) {
        self.floor = 0.0;
        self.breakdown = None;
    }
}
