//! Presentation scripts: a TOML file with an optional title and an ordered
//! `[[sections]]` array.

use anyhow::{Context, Result, anyhow};
use narration_core::schedule::{Section, validate_sections};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Presentation {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

pub fn parse_presentation(contents: &str) -> Result<Presentation> {
    let presentation: Presentation =
        toml::from_str(contents).context("Presentation script is not valid TOML")?;
    validate_sections(&presentation.sections).map_err(|err| anyhow!(err))?;
    Ok(presentation)
}

pub fn load_presentation(path: &Path) -> Result<Presentation> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read presentation {}", path.display()))?;
    let presentation = parse_presentation(&contents)
        .with_context(|| format!("Failed to load presentation {}", path.display()))?;
    info!(
        path = %path.display(),
        title = presentation.title.as_deref().unwrap_or("untitled"),
        sections = presentation.sections.len(),
        "Loaded presentation script"
    );
    Ok(presentation)
}
