//! Keyboard listener
//!
//! Runs on its own thread in raw mode, decoding crossterm key events into
//! [`Command`]s with a 100 ms per-key debounce so auto-repeat and bouncy
//! keys collapse to one command. It reads playback state (to pick the
//! direction of the space toggle) but only ever enqueues commands.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use parking_lot::Mutex;
use tracing::{debug, warn};

use narrate_core::PlaybackState;

use crate::command::{Command, SEEK_STEP_SECONDS, SPEED_STEP};
use crate::PlaybackError;

/// Duplicate key events inside this window collapse to one command
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(100);

/// How long each poll waits before re-checking the shutdown flag
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Collapses duplicate presses of the same key inside [`DEBOUNCE_WINDOW`]
///
/// The window is measured from the last accepted press, so a held key
/// produces one command per window rather than one per repeat event.
struct Debouncer {
    last: Option<(KeyCode, Instant)>,
}

impl Debouncer {
    fn new() -> Self {
        Self { last: None }
    }

    /// Whether a press of `code` at `now` should produce a command
    fn accept(&mut self, code: KeyCode, now: Instant) -> bool {
        if let Some((last_code, at)) = self.last {
            if last_code == code && now.duration_since(at) < DEBOUNCE_WINDOW {
                return false;
            }
        }
        self.last = Some((code, now));
        true
    }
}

fn input_error(e: io::Error) -> PlaybackError {
    PlaybackError::Input(e.to_string())
}

/// Map one key press to a command, given the current playback state
fn map_key(code: KeyCode, modifiers: KeyModifiers, state: &PlaybackState) -> Option<Command> {
    match code {
        KeyCode::Char(' ') => {
            if state.is_playing {
                Some(Command::Pause)
            } else if state.is_paused {
                Some(Command::Resume)
            } else {
                None
            }
        }
        KeyCode::Right => Some(Command::Seek(SEEK_STEP_SECONDS)),
        KeyCode::Left => Some(Command::Seek(-SEEK_STEP_SECONDS)),
        KeyCode::Up => Some(Command::SpeedAdjust(SPEED_STEP)),
        KeyCode::Down => Some(Command::SpeedAdjust(-SPEED_STEP)),
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Some(Command::Quit),
        KeyCode::Char('q') | KeyCode::Esc => Some(Command::Quit),
        _ => None,
    }
}

/// Spawn the keyboard listener thread
///
/// The thread exits when the shutdown flag is set or the command queue's
/// receiver is dropped; a polling or read failure is returned to the joiner
/// as [`PlaybackError::Input`]. Raw mode is restored on exit either way.
pub fn spawn_keyboard_listener(
    commands: Sender<Command>,
    state: Arc<Mutex<PlaybackState>>,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<Result<(), PlaybackError>> {
    thread::spawn(move || {
        let raw_mode = terminal::enable_raw_mode().is_ok();
        if !raw_mode {
            warn!("raw mode unavailable, keyboard controls may echo");
        }

        let result = listen(&commands, &state, &shutdown);

        if raw_mode {
            let _ = terminal::disable_raw_mode();
        }
        result
    })
}

fn listen(
    commands: &Sender<Command>,
    state: &Mutex<PlaybackState>,
    shutdown: &AtomicBool,
) -> Result<(), PlaybackError> {
    let mut debouncer = Debouncer::new();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            return Ok(());
        }

        match event::poll(POLL_TIMEOUT) {
            Ok(false) => continue,
            Ok(true) => {}
            Err(e) => return Err(input_error(e)),
        }

        let Event::Key(key) = event::read().map_err(input_error)? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        if !debouncer.accept(key.code, Instant::now()) {
            continue;
        }

        let command = {
            let state = state.lock();
            map_key(key.code, key.modifiers, &state)
        };
        if let Some(command) = command {
            debug!(?command, "keyboard command");
            if commands.send(command).is_err() {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing() -> PlaybackState {
        PlaybackState {
            is_playing: true,
            ..Default::default()
        }
    }

    fn paused() -> PlaybackState {
        PlaybackState {
            is_paused: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_space_toggles_by_state() {
        let none = KeyModifiers::NONE;
        assert_eq!(
            map_key(KeyCode::Char(' '), none, &playing()),
            Some(Command::Pause)
        );
        assert_eq!(
            map_key(KeyCode::Char(' '), none, &paused()),
            Some(Command::Resume)
        );
        assert_eq!(
            map_key(KeyCode::Char(' '), none, &PlaybackState::default()),
            None
        );
    }

    #[test]
    fn test_arrow_keys() {
        let none = KeyModifiers::NONE;
        let state = playing();
        assert_eq!(map_key(KeyCode::Right, none, &state), Some(Command::Seek(5)));
        assert_eq!(map_key(KeyCode::Left, none, &state), Some(Command::Seek(-5)));
        assert_eq!(
            map_key(KeyCode::Up, none, &state),
            Some(Command::SpeedAdjust(0.25))
        );
        assert_eq!(
            map_key(KeyCode::Down, none, &state),
            Some(Command::SpeedAdjust(-0.25))
        );
    }

    #[test]
    fn test_quit_keys() {
        let state = playing();
        assert_eq!(
            map_key(KeyCode::Char('q'), KeyModifiers::NONE, &state),
            Some(Command::Quit)
        );
        assert_eq!(
            map_key(KeyCode::Esc, KeyModifiers::NONE, &state),
            Some(Command::Quit)
        );
        assert_eq!(
            map_key(KeyCode::Char('c'), KeyModifiers::CONTROL, &state),
            Some(Command::Quit)
        );
        // Plain 'c' is not quit
        assert_eq!(map_key(KeyCode::Char('c'), KeyModifiers::NONE, &state), None);
    }

    #[test]
    fn test_unmapped_keys_are_ignored() {
        let state = playing();
        assert_eq!(map_key(KeyCode::Char('x'), KeyModifiers::NONE, &state), None);
        assert_eq!(map_key(KeyCode::Enter, KeyModifiers::NONE, &state), None);
    }

    #[test]
    fn test_debounce_collapses_rapid_repeats() {
        let mut debouncer = Debouncer::new();
        let start = Instant::now();

        assert!(debouncer.accept(KeyCode::Char(' '), start));
        // Repeats inside the window are swallowed
        assert!(!debouncer.accept(KeyCode::Char(' '), start + Duration::from_millis(30)));
        assert!(!debouncer.accept(KeyCode::Char(' '), start + Duration::from_millis(99)));
        // The window is measured from the accepted press, not the last repeat
        assert!(debouncer.accept(KeyCode::Char(' '), start + DEBOUNCE_WINDOW));
    }

    #[test]
    fn test_debounce_lets_distinct_keys_through() {
        let mut debouncer = Debouncer::new();
        let start = Instant::now();

        assert!(debouncer.accept(KeyCode::Char(' '), start));
        assert!(debouncer.accept(KeyCode::Right, start + Duration::from_millis(10)));
        assert!(debouncer.accept(KeyCode::Left, start + Duration::from_millis(20)));
        // The swallowed window tracks the most recent accepted key
        assert!(!debouncer.accept(KeyCode::Left, start + Duration::from_millis(60)));
    }

    #[test]
    fn test_debounce_each_window_yields_one_command() {
        let mut debouncer = Debouncer::new();
        let start = Instant::now();

        let accepted = (0..10)
            .filter(|i| debouncer.accept(KeyCode::Right, start + Duration::from_millis(i * 25)))
            .count();
        // 250 ms of 25 ms-spaced repeats: one accept per 100 ms window
        assert_eq!(accepted, 3);
    }

    #[test]
    fn test_poll_failure_surfaces_as_input_error() {
        let err = input_error(io::Error::other("terminal closed"));
        assert_eq!(err.to_string(), "Keyboard input error: terminal closed");
        assert!(matches!(err, PlaybackError::Input(_)));
    }
}
