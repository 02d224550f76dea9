//! Chunk types for streaming synthesis
//!
//! A chunk is one unit of sentence-grouped text plus its (eventually)
//! synthesized audio. Chunks are created `Pending` by the chunker and claimed
//! exactly once by whichever actor synthesizes them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::audio::wav_duration_ms;

/// Synthesis lifecycle of a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkStatus {
    /// Waiting to be claimed by a synthesizing actor
    Pending,
    /// Claimed; synthesis in flight
    InProgress,
    /// Audio available
    Completed,
    /// Synthesis failed; playback skips this chunk
    Failed,
}

/// One unit of text awaiting/holding synthesized audio
#[derive(Debug, Clone)]
pub struct Chunk {
    /// 0-based position in the chunk list; defines playback order
    pub index: usize,
    /// Sentence-grouped source text
    pub text: String,
    /// Encoded audio bytes, absent until synthesis completes
    pub audio: Option<Arc<[u8]>>,
    /// Playback duration derived from the audio, when known
    pub duration_ms: Option<u64>,
    /// Current lifecycle status
    pub status: ChunkStatus,
}

impl Chunk {
    /// Create a pending chunk
    pub fn new(index: usize, text: String) -> Self {
        Self {
            index,
            text,
            audio: None,
            duration_ms: None,
            status: ChunkStatus::Pending,
        }
    }

    /// Record completed synthesis, deriving the duration from the WAV header
    pub fn complete(&mut self, audio: Vec<u8>) {
        self.duration_ms = wav_duration_ms(&audio);
        self.audio = Some(audio.into());
        self.status = ChunkStatus::Completed;
    }

    /// Record a failed synthesis attempt
    pub fn fail(&mut self) {
        self.audio = None;
        self.duration_ms = None;
        self.status = ChunkStatus::Failed;
    }

    /// Number of words in this chunk's text
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}
