//! Playback commands
//!
//! Commands are enqueued by the keyboard listener and consumed strictly in
//! arrival order by the controller's command loop; the listener itself never
//! mutates playback state.

/// Seek step applied per arrow-key press, in seconds
pub const SEEK_STEP_SECONDS: i64 = 5;

/// Speed step applied per arrow-key press
pub const SPEED_STEP: f32 = 0.25;

/// A user playback command
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Pause,
    Resume,
    Quit,
    /// Relative seek in seconds (negative = backwards)
    Seek(i64),
    /// Requested speed delta; surfaced as a notice, not applied at runtime
    SpeedAdjust(f32),
}
