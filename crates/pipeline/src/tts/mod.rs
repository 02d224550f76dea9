//! Text-to-speech synthesis
//!
//! The pipeline never talks to a concrete voice engine directly; it goes
//! through the [`SynthesisEngine`] capability so the worker pool, on-demand
//! synthesis and tests all share one seam. Production uses
//! [`piper::PiperHttpEngine`]; [`StubEngine`] renders silence for tests and
//! dry runs.

pub mod chunker;
pub mod piper;
pub mod synthesizer;

use std::io::Cursor;

use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

/// Errors originating inside a synthesis engine, propagated opaquely
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Engine error: {0}")]
    Engine(String),
}

/// Voice synthesis capability
///
/// Calls may be slow (hundreds of ms to seconds) and may fail; callers treat
/// them as blocking and never hold shared locks across a call.
pub trait SynthesisEngine: Send + Sync {
    /// Turn text into encoded audio bytes at the given speed (0.5-2.0)
    fn synthesize(&self, text: &str, speed: f32) -> Result<Vec<u8>, EngineError>;
}

/// Engine that renders silence proportional to the word count
///
/// Stands in for a real voice model in tests and `--engine stub` dry runs,
/// so the whole pipeline can be exercised without a model on disk.
pub struct StubEngine {
    sample_rate: u32,
}

/// Silence per word at speed 1.0
const STUB_MS_PER_WORD: u64 = 300;

impl StubEngine {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl Default for StubEngine {
    fn default() -> Self {
        Self::new(22050)
    }
}

impl SynthesisEngine for StubEngine {
    fn synthesize(&self, text: &str, speed: f32) -> Result<Vec<u8>, EngineError> {
        if text.trim().is_empty() {
            return Err(EngineError::InvalidInput("empty text".to_string()));
        }

        let words = text.unicode_words().count().max(1) as u64;
        let duration_ms = (words * STUB_MS_PER_WORD) as f32 / speed;
        let samples = (self.sample_rate as f32 * duration_ms / 1000.0) as usize;

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| EngineError::Engine(e.to_string()))?;
            for _ in 0..samples {
                writer
                    .write_sample(0i16)
                    .map_err(|e| EngineError::Engine(e.to_string()))?;
            }
            writer
                .finalize()
                .map_err(|e| EngineError::Engine(e.to_string()))?;
        }
        Ok(cursor.into_inner())
    }
}
