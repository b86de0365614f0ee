//! Entry point for the narration player.
//!
//! Responsibilities here are intentionally minimal:
//! - Parse command-line arguments.
//! - Load user configuration from `conf/config.toml`.
//! - Load the presentation script.
//! - Drive a transport against the simulated speech engine until narration
//!   completes or Ctrl+C is pressed.

mod script;
mod sim_engine;

use crate::script::load_presentation;
use crate::sim_engine::{EngineNotice, SimulatedEngine};
use anyhow::{Context, Result, anyhow};
use narration_core::{
    CancellationToken, PlaybackController, Transport, TransportView, load_config,
};
use std::cell::{Cell, RefCell};
use std::env;
use std::path::PathBuf;
use std::rc::Rc;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

const DEFAULT_CONFIG_PATH: &str = "conf/config.toml";
const USAGE: &str =
    "Usage: narration-player <presentation.toml> [--rate <x>] [--voice <name>] [--config <path>]";

#[derive(Debug, PartialEq)]
struct Args {
    script: PathBuf,
    config: PathBuf,
    rate: Option<f32>,
    voice: Option<String>,
}

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let args = parse_args(env::args().skip(1))?;
    let mut config = load_config(&args.config);
    if let Some(rate) = args.rate {
        config.rate = rate;
    }
    if let Some(voice) = args.voice {
        config.preferred_voice = Some(voice);
    }
    let config = config.sanitized();
    set_log_level(reload_handle, config.log_level.as_filter_str());
    info!(
        path = %args.script.display(),
        level = %config.log_level,
        rate = config.rate,
        "Starting narration player"
    );

    let presentation = load_presentation(&args.script)?;
    let options = config.playback_options();
    let tick_interval = options.tick_interval;

    let engine = Rc::new(RefCell::new(SimulatedEngine::new(Instant::now())));
    let completed = Rc::new(Cell::new(false));
    let completion_flag = Rc::clone(&completed);
    let controller = PlaybackController::new(presentation.sections, Rc::clone(&engine), options)
        .context("Failed to prepare narration")?
        .on_complete(move || completion_flag.set(true));
    let mut transport = Transport::new(controller);
    transport.subscribe(view_logger());

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C; stopping narration");
        signal_token.cancel();
    }) {
        warn!("Failed to install Ctrl+C signal handler: {err}");
    }

    let event = transport.play().context("Failed to start narration")?;
    debug!(event = %serde_json::to_string(&event)?, "Transport event");

    loop {
        if let Err(err) = cancel.check_cancelled("narration_loop") {
            let event = transport.stop()?;
            info!(action = %event.action, "{err}");
            break;
        }
        let now = Instant::now();
        let notices = engine.borrow_mut().poll(now);
        for notice in notices {
            match notice {
                EngineNotice::Speech(event) => transport
                    .on_speech_event(event, now)
                    .context("Narration aborted")?,
                EngineNotice::VoicesChanged => transport.voices_changed(),
            }
        }
        transport.tick(now);
        if completed.get() {
            break;
        }
        thread::sleep(tick_interval);
    }

    let view = transport.view();
    info!(
        state = %view.state,
        progress = view.progress_pct,
        revealed = view.revealed_sections,
        voice = view.voice_name.as_deref().unwrap_or("engine default"),
        "Narration finished"
    );
    Ok(())
}

/// Log section and state changes at info, every other view update at trace.
fn view_logger() -> impl FnMut(&TransportView) {
    let mut last: Option<(narration_core::PlaybackState, Option<String>)> = None;
    move |view| {
        let key = (view.state, view.active_section_id.clone());
        if last.as_ref() != Some(&key) {
            info!(
                state = %view.state,
                section = view.active_section_id.as_deref().unwrap_or("-"),
                progress = format!("{:.1}%", view.progress_pct),
                "Narration view changed"
            );
            last = Some(key);
        }
        trace!(
            progress = view.progress_pct,
            subtitle = %view.active_section_text,
            "Progress update"
        );
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut script = None;
    let mut config = PathBuf::from(DEFAULT_CONFIG_PATH);
    let mut rate = None;
    let mut voice = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--rate" => {
                let value = args.next().ok_or_else(|| anyhow!("--rate needs a value\n{USAGE}"))?;
                let parsed = value
                    .parse::<f32>()
                    .with_context(|| format!("Invalid --rate value: {value}"))?;
                rate = Some(parsed);
            }
            "--voice" => {
                voice = Some(args.next().ok_or_else(|| anyhow!("--voice needs a value\n{USAGE}"))?);
            }
            "--config" => {
                let value = args.next().ok_or_else(|| anyhow!("--config needs a value\n{USAGE}"))?;
                config = PathBuf::from(value);
            }
            _ if script.is_none() && !arg.starts_with("--") => script = Some(PathBuf::from(arg)),
            _ => return Err(anyhow!("Unexpected argument: {arg}\n{USAGE}")),
        }
    }
    let script = script.ok_or_else(|| anyhow!(USAGE))?;
    if !script.exists() {
        return Err(anyhow!("File not found: {}", script.display()));
    }
    Ok(Args {
        script,
        config,
        rate,
        voice,
    })
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    debug!("Logging initialized; override level with config log_level or RUST_LOG");
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    if env::var_os("RUST_LOG").is_some() {
        debug!("RUST_LOG is set; keeping the startup log filter");
        return;
    }
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = handle.modify(|filter| *filter = parsed.clone()) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}
