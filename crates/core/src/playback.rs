//! Playback state shared between the controller and the output device

use serde::{Deserialize, Serialize};

/// Allowed playback speed range
pub const MIN_SPEED: f32 = 0.5;
/// Allowed playback speed range
pub const MAX_SPEED: f32 = 2.0;

/// Live playback state
///
/// Exactly one of `is_playing`/`is_paused` is true while a session is
/// active; both are false before start and after quit or completion. Only
/// the command-processing loop and the playback loop's terminal transition
/// mutate this state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub is_paused: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
    /// Output volume, 0-100
    pub volume: u8,
    /// Synthesis speed, 0.5-2.0; fixed before playback starts
    pub speed: f32,
    /// Index of the chunk currently loaded (streaming mode only)
    pub current_chunk: Option<usize>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            is_playing: false,
            is_paused: false,
            position_ms: 0,
            duration_ms: 0,
            volume: 80,
            speed: 1.0,
            current_chunk: None,
        }
    }
}

impl PlaybackState {
    /// Session is active (playing or paused)
    pub fn is_active(&self) -> bool {
        self.is_playing || self.is_paused
    }

    /// Clamp a requested speed into the supported range
    pub fn clamp_speed(speed: f32) -> f32 {
        speed.clamp(MIN_SPEED, MAX_SPEED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_inactive() {
        let state = PlaybackState::default();
        assert!(!state.is_active());
        assert!(!state.is_playing);
        assert!(!state.is_paused);
    }

    #[test]
    fn test_clamp_speed() {
        assert_eq!(PlaybackState::clamp_speed(0.1), 0.5);
        assert_eq!(PlaybackState::clamp_speed(1.25), 1.25);
        assert_eq!(PlaybackState::clamp_speed(5.0), 2.0);
    }
}
