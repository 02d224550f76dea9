//! narrate entry point
//!
//! Reads text from a file, a `--text` flag or stdin, streams it through the
//! chunked synthesis pipeline and plays it back with interactive controls.

mod args;
mod settings;

use std::fs;
use std::io::{self, Read};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use narrate_pipeline::{
    ChunkSynthesizer, PiperHttpEngine, StubEngine, SynthesisEngine, SynthesizerConfig,
};
use narrate_playback::{ControllerConfig, PlaybackController, PlaybackSource, RodioOutput};

use args::{Args, EngineKind};
use settings::Settings;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings =
        settings::load_settings(args.config.as_deref()).context("loading configuration")?;
    apply_overrides(&mut settings, &args);
    settings.validate().context("applying command-line flags")?;

    init_tracing(&settings);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting narrate");

    let text = read_text(&args)?;
    if text.trim().is_empty() {
        bail!("no text to read: pass a file, --text, or pipe text on stdin");
    }

    run(&settings, &text)
}

/// Command-line flags win over file and environment settings
fn apply_overrides(settings: &mut Settings, args: &Args) {
    if let Some(engine) = args.engine {
        settings.engine.backend = match engine {
            EngineKind::Stub => "stub".to_string(),
            EngineKind::Piper => "piper".to_string(),
        };
    }
    if let Some(endpoint) = &args.endpoint {
        settings.engine.endpoint = endpoint.clone();
    }
    if let Some(voice) = &args.voice {
        settings.engine.voice = Some(voice.clone());
    }
    if let Some(speed) = args.speed {
        settings.pipeline.speed = speed;
    }
    if let Some(workers) = args.workers {
        settings.pipeline.workers = workers;
    }
    if let Some(target_words) = args.target_words {
        settings.pipeline.target_words = target_words;
    }
    if let Some(volume) = args.volume {
        settings.playback.volume = volume;
    }
    if args.no_keyboard {
        settings.playback.keyboard = false;
    }
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("narrate={}", settings.observability.log_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_text(args: &Args) -> anyhow::Result<String> {
    if let Some(path) = &args.input {
        return fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()));
    }
    if let Some(text) = &args.text {
        return Ok(text.clone());
    }
    let mut text = String::new();
    io::stdin()
        .read_to_string(&mut text)
        .context("reading stdin")?;
    Ok(text)
}

fn build_engine(settings: &Settings) -> anyhow::Result<Arc<dyn SynthesisEngine>> {
    match settings.engine.backend.as_str() {
        "stub" => Ok(Arc::new(StubEngine::default())),
        _ => {
            let engine =
                PiperHttpEngine::new(&settings.engine.endpoint, settings.engine.voice.clone())
                    .context("connecting to synthesis engine")?;
            Ok(Arc::new(engine))
        }
    }
}

fn run(settings: &Settings, text: &str) -> anyhow::Result<()> {
    let engine = build_engine(settings)?;

    let synthesizer = Arc::new(ChunkSynthesizer::new(
        engine,
        SynthesizerConfig {
            target_words: settings.pipeline.target_words,
            worker_count: settings.pipeline.workers,
            speed: settings.pipeline.speed,
        },
    ));

    let chunk_count = synthesizer.prepare_chunks(text)?;
    tracing::info!(chunks = chunk_count, "text chunked");

    // First chunk is synthesized up front so playback starts immediately
    synthesizer
        .synthesize_first_chunk()
        .context("synthesizing first chunk")?;
    synthesizer.start_background_synthesis();

    let output = Arc::new(RodioOutput::new().context("opening audio output")?);
    let controller = PlaybackController::new(
        output,
        ControllerConfig {
            volume: settings.playback.volume,
            speed: settings.pipeline.speed,
            keyboard: settings.playback.keyboard,
        },
    );

    controller.start(PlaybackSource::Stream(synthesizer))?;
    tracing::info!("playback finished");
    Ok(())
}
