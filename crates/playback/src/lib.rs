//! Interactive playback
//!
//! This crate drives synthesized audio through an [`AudioOutput`] device
//! while a keyboard listener feeds a command queue: pause, resume, seek and
//! quit work live while background synthesis keeps filling the pipeline.

pub mod command;
pub mod controller;
pub mod keyboard;
pub mod output;

pub use command::Command;
pub use controller::{ControllerConfig, PlaybackController, PlaybackSource};
pub use keyboard::spawn_keyboard_listener;
pub use output::{AudioOutput, OutputStatus, RodioOutput};

use narrate_pipeline::PipelineError;
use thiserror::Error;

/// Playback errors
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("No playback source provided")]
    MissingSource,

    #[error("Invalid state transition: cannot {action} while {state}")]
    InvalidStateTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("Audio output error: {0}")]
    Output(String),

    #[error("Keyboard input error: {0}")]
    Input(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
