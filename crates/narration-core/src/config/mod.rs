//! Configuration for narration playback.
//!
//! Settings are read from `conf/config.toml` when present. The file is split
//! into `[logging]`, `[speech]`, `[progress]` and `[estimator]` tables; any
//! missing or unusable entry falls back to its default so playback can always
//! start.

mod defaults;
mod io;
mod models;
mod tables;

pub use io::{load_config, parse_config, serialize_config};
pub use models::{LogLevel, NarrationConfig};
