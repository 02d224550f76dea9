//! Streaming synthesis pipeline
//!
//! This crate turns raw text into progressively available audio:
//! - Sentence-respecting chunking
//! - Synchronous synthesis of chunk 0 (the advertised time-to-first-audio)
//! - A small background worker pool feeding a bounded ready-buffer
//! - On-demand synthesis for chunks ahead of background progress

pub mod tts;

pub use tts::chunker::{chunk_text, DEFAULT_TARGET_WORDS};
pub use tts::piper::PiperHttpEngine;
pub use tts::synthesizer::{
    BufferStatus, ChunkSynthesizer, SynthesizerConfig, DEFAULT_WORKER_COUNT,
    READY_BUFFER_CAPACITY,
};
pub use tts::{EngineError, StubEngine, SynthesisEngine};

use thiserror::Error;

/// Pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Text is empty")]
    EmptyText,

    #[error("No chunks prepared")]
    NoChunksPrepared,

    #[error("Chunk index {0} out of range")]
    IndexOutOfRange(usize),

    #[error("Synthesis engine error: {0}")]
    Engine(#[from] EngineError),
}
