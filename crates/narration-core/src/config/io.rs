use super::models::NarrationConfig;
use super::tables::ConfigTables;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Parse a TOML document into a sanitized configuration.
pub fn parse_config(contents: &str) -> Result<NarrationConfig, toml::de::Error> {
    let tables: ConfigTables = toml::from_str(contents)?;
    Ok(NarrationConfig::from(tables).sanitized())
}

pub fn serialize_config(config: &NarrationConfig) -> Result<String, toml::ser::Error> {
    toml::to_string(&ConfigTables::from(config))
}

/// Load configuration from the given path, falling back to defaults on error.
pub fn load_config(path: &Path) -> NarrationConfig {
    let contents = match fs::read_to_string(path) {
        Ok(data) => {
            info!(path = %path.display(), "Loaded base config");
            data
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                "Falling back to default config: {err}"
            );
            return NarrationConfig::default();
        }
    };

    match parse_config(&contents) {
        Ok(cfg) => {
            debug!("Parsed configuration from disk");
            cfg
        }
        Err(err) => {
            warn!(path = %path.display(), "Invalid config TOML: {err}");
            NarrationConfig::default()
        }
    }
}
