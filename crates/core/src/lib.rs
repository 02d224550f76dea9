//! Core types for the narrate read-aloud pipeline
//!
//! This crate provides foundational types used across the other crates:
//! - Text/audio chunk types and their lifecycle
//! - Playback state shared between the controller and the output device
//! - WAV inspection helpers

pub mod audio;
pub mod chunk;
pub mod playback;

pub use audio::wav_duration_ms;
pub use chunk::{Chunk, ChunkStatus};
pub use playback::PlaybackState;
