//! Voice catalog entries and the scoring policy used to pick a narrator.
//!
//! Catalog voices are shared handles (`Arc<Voice>`); selection hands back a
//! clone of the handle, never a copy of the voice itself.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Provider family whose voices are consistently high quality.
const PREMIUM_FAMILY: &str = "google";

const FAMILY_ENGLISH_BONUS: i32 = 1000;
const ENGLISH_BONUS: i32 = 100;
const MAJOR_REGION_BONUS: i32 = 50;
const MINOR_REGION_BONUS: i32 = 20;
const ALLOW_LIST_STEP: i32 = 10;
const FAMILY_BONUS: i32 = 50;
const QUALITY_MARKER_BONUS: i32 = 80;
const LOCAL_SERVICE_BONUS: i32 = 5;
const NOVELTY_PENALTY: i32 = -1000;

/// Curated high-quality voices, best first.
const PREFERRED_VOICES: &[&str] = &[
    "Google US English",
    "Google UK English Female",
    "Google UK English Male",
    "Microsoft Aria Online (Natural) - English (United States)",
    "Microsoft Jenny Online (Natural) - English (United States)",
    "Microsoft Guy Online (Natural) - English (United States)",
    "Samantha",
    "Daniel",
    "Karen",
    "Moira",
    "Alex",
];

/// Novelty and low-fidelity voices that should never narrate a lesson.
const NOVELTY_VOICES: &[&str] = &[
    "Albert",
    "Bad News",
    "Bahh",
    "Bells",
    "Boing",
    "Bubbles",
    "Cellos",
    "Deranged",
    "Good News",
    "Hysterical",
    "Jester",
    "Junior",
    "Organ",
    "Pipe Organ",
    "Ralph",
    "Superstar",
    "Trinoids",
    "Whisper",
    "Wobble",
    "Zarvox",
];

static RE_QUALITY_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(neural|natural|premium|enhanced|wavenet|online)\b").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub name: String,
    /// BCP 47 language tag such as `en-US`.
    pub lang: String,
    /// Synthesized on-device rather than by a network service.
    #[serde(default)]
    pub local_service: bool,
}

impl Voice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
            local_service: false,
        }
    }

    pub fn local(mut self) -> Self {
        self.local_service = true;
        self
    }

    fn primary_language(&self) -> String {
        self.lang
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase()
    }

    fn region(&self) -> Option<String> {
        self.lang
            .split(['-', '_'])
            .nth(1)
            .map(|region| region.to_ascii_uppercase())
    }

    pub fn is_english(&self) -> bool {
        self.primary_language() == "en"
    }

    fn is_premium_family(&self) -> bool {
        self.name.to_ascii_lowercase().contains(PREMIUM_FAMILY)
    }
}

/// Additive quality score; higher is better.
pub fn score_voice(voice: &Voice) -> i32 {
    let mut score = 0;
    let english = voice.is_english();
    let premium = voice.is_premium_family();

    if premium && english {
        score += FAMILY_ENGLISH_BONUS;
    }
    if english {
        score += ENGLISH_BONUS;
        score += match voice.region().as_deref() {
            Some("US") | Some("GB") => MAJOR_REGION_BONUS,
            Some(_) => MINOR_REGION_BONUS,
            None => 0,
        };
    }
    if let Some(rank) = PREFERRED_VOICES
        .iter()
        .position(|preferred| preferred.eq_ignore_ascii_case(&voice.name))
    {
        score += (PREFERRED_VOICES.len() - rank) as i32 * ALLOW_LIST_STEP;
    }
    if premium {
        score += FAMILY_BONUS;
    }
    if RE_QUALITY_MARKER.is_match(&voice.name) {
        score += QUALITY_MARKER_BONUS;
    }
    if voice.local_service {
        score += LOCAL_SERVICE_BONUS;
    }
    if is_novelty(&voice.name) {
        score += NOVELTY_PENALTY;
    }
    score
}

/// Catalog voices ordered best first; equal scores keep catalog order.
pub fn rank_voices(catalog: &[Arc<Voice>]) -> Vec<(Arc<Voice>, i32)> {
    let mut ranked: Vec<(Arc<Voice>, i32)> = catalog
        .iter()
        .map(|voice| (Arc::clone(voice), score_voice(voice)))
        .collect();
    // `sort_by` is stable, which is what keeps ties in catalog order.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

/// Best voice in the catalog, or `None` when it is empty (engine default).
pub fn select_best(catalog: &[Arc<Voice>]) -> Option<Arc<Voice>> {
    let mut best: Option<(&Arc<Voice>, i32)> = None;
    for voice in catalog {
        let score = score_voice(voice);
        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((voice, score));
        }
    }
    if let Some((voice, score)) = best {
        debug!(voice = %voice.name, lang = %voice.lang, score, "Selected narration voice");
    }
    best.map(|(voice, _)| Arc::clone(voice))
}

pub fn find_by_name(catalog: &[Arc<Voice>], name: &str) -> Option<Arc<Voice>> {
    catalog
        .iter()
        .find(|voice| voice.name.eq_ignore_ascii_case(name))
        .cloned()
}

fn is_novelty(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    NOVELTY_VOICES.iter().any(|novelty| {
        let novelty = novelty.to_ascii_lowercase();
        lowered == novelty
            || lowered
                .strip_prefix(&novelty)
                .is_some_and(|rest| rest.starts_with([' ', '(']))
    })
}
