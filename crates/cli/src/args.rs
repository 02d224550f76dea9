//! Command-line arguments
//!
//! Flags override the corresponding [`Settings`](crate::settings::Settings)
//! fields; anything left unset falls through to the config file and
//! environment.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Synthesis backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EngineKind {
    /// Silent built-in engine, useful for dry runs
    Stub,
    /// Piper HTTP server
    Piper,
}

#[derive(Parser, Debug)]
#[command(name = "narrate", version, about = "Read text aloud with streaming synthesis")]
pub struct Args {
    /// Text file to read aloud
    pub input: Option<PathBuf>,

    /// Literal text to read instead of a file
    #[arg(long, conflicts_with = "input")]
    pub text: Option<String>,

    /// Config file path (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Synthesis backend
    #[arg(long, value_enum)]
    pub engine: Option<EngineKind>,

    /// Piper server base URL
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Voice name passed to the engine
    #[arg(long)]
    pub voice: Option<String>,

    /// Playback speed (0.5-2.0)
    #[arg(long)]
    pub speed: Option<f32>,

    /// Background synthesis workers
    #[arg(long)]
    pub workers: Option<usize>,

    /// Target chunk size in words
    #[arg(long)]
    pub target_words: Option<usize>,

    /// Output volume (0-100)
    #[arg(long)]
    pub volume: Option<u8>,

    /// Disable interactive keyboard controls
    #[arg(long)]
    pub no_keyboard: bool,
}
