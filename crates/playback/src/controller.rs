//! Interactive playback controller
//!
//! Drives either a fixed audio buffer or a live chunk-synthesizer stream
//! through the audio output, while a command queue fed by the keyboard
//! listener lets the user pause, resume, seek and quit concurrently.
//!
//! State machine: Idle -> Playing <-> Paused -> Stopped, with Quit terminal
//! from any active state. All `PlaybackState` mutation happens on the
//! command loop (the thread that called `start`) or the playback loop's own
//! terminal transition, never on the keyboard listener.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use narrate_core::{wav_duration_ms, ChunkStatus, PlaybackState};
use narrate_pipeline::ChunkSynthesizer;

use crate::command::Command;
use crate::keyboard::spawn_keyboard_listener;
use crate::output::AudioOutput;
use crate::PlaybackError;

/// Poll interval while waiting for the next chunk to synthesize
pub const CHUNK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long the command loop blocks before re-checking for completion
const COMMAND_TIMEOUT: Duration = Duration::from_millis(200);

/// What a playback session consumes
pub enum PlaybackSource {
    /// A single pre-synthesized audio buffer
    Buffer(Vec<u8>),
    /// A live stream of chunks from the synthesis pipeline
    Stream(Arc<ChunkSynthesizer>),
}

impl PlaybackSource {
    /// Build a source from optional inputs; exactly one must be provided
    pub fn from_parts(
        audio: Option<Vec<u8>>,
        synthesizer: Option<Arc<ChunkSynthesizer>>,
    ) -> Result<Self, PlaybackError> {
        match (audio, synthesizer) {
            (Some(audio), None) => Ok(Self::Buffer(audio)),
            (None, Some(synthesizer)) => Ok(Self::Stream(synthesizer)),
            _ => Err(PlaybackError::MissingSource),
        }
    }
}

/// Controller options
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Initial output volume (0-100)
    pub volume: u8,
    /// Session speed; informational once playback starts
    pub speed: f32,
    /// Spawn the crossterm keyboard listener (disabled in tests)
    pub keyboard: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            volume: 80,
            speed: 1.0,
            keyboard: true,
        }
    }
}

/// Drives audio through the output device under live user control
pub struct PlaybackController {
    output: Arc<dyn AudioOutput>,
    config: ControllerConfig,
    state: Arc<Mutex<PlaybackState>>,
    shutdown: Arc<AtomicBool>,
    commands_tx: Sender<Command>,
    commands_rx: Mutex<Option<Receiver<Command>>>,
}

impl PlaybackController {
    /// Create a controller over an explicitly owned output device
    pub fn new(output: Arc<dyn AudioOutput>, config: ControllerConfig) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel();
        let state = PlaybackState {
            volume: config.volume.min(100),
            speed: PlaybackState::clamp_speed(config.speed),
            ..Default::default()
        };
        Self {
            output,
            config,
            state: Arc::new(Mutex::new(state)),
            shutdown: Arc::new(AtomicBool::new(false)),
            commands_tx,
            commands_rx: Mutex::new(Some(commands_rx)),
        }
    }

    /// Handle for enqueueing commands from other producers
    pub fn command_sender(&self) -> Sender<Command> {
        self.commands_tx.clone()
    }

    /// Snapshot of the playback state, refreshed from the output device
    pub fn state(&self) -> PlaybackState {
        let mut snapshot = self.state.lock().clone();
        let device = self.output.status();
        snapshot.position_ms = device.position_ms;
        if device.duration_ms > 0 {
            snapshot.duration_ms = device.duration_ms;
        }
        snapshot
    }

    /// Run a playback session to completion
    ///
    /// Spawns the playback loop (and, when configured, the keyboard
    /// listener), then drains the command queue on the calling thread until
    /// the user quits or playback finishes naturally. A session can run at
    /// most once per controller.
    pub fn start(&self, source: PlaybackSource) -> Result<(), PlaybackError> {
        let commands_rx = self
            .commands_rx
            .lock()
            .take()
            .ok_or(PlaybackError::InvalidStateTransition {
                action: "start",
                state: "already started",
            })?;

        self.shutdown.store(false, Ordering::SeqCst);
        self.output.set_volume(self.config.volume);
        {
            let mut state = self.state.lock();
            state.is_playing = true;
            state.is_paused = false;
        }

        let keyboard = self.config.keyboard.then(|| {
            spawn_keyboard_listener(
                self.commands_tx.clone(),
                Arc::clone(&self.state),
                Arc::clone(&self.shutdown),
            )
        });

        let failure: Arc<Mutex<Option<PlaybackError>>> = Arc::new(Mutex::new(None));
        let playback = {
            let output = Arc::clone(&self.output);
            let state = Arc::clone(&self.state);
            let shutdown = Arc::clone(&self.shutdown);
            let failure = Arc::clone(&failure);
            thread::spawn(move || {
                let result = match source {
                    PlaybackSource::Buffer(audio) => {
                        play_fixed_buffer(&*output, &state, &audio)
                    }
                    PlaybackSource::Stream(synthesizer) => {
                        play_stream(&*output, &state, &shutdown, &synthesizer)
                    }
                };
                if let Err(e) = result {
                    error!(error = %e, "playback session failed");
                    *failure.lock() = Some(e);
                }
                // Terminal transition: session over, whatever the cause
                let mut state = state.lock();
                state.is_playing = false;
                state.is_paused = false;
            })
        };

        self.run_command_loop(commands_rx);

        if playback.join().is_err() {
            warn!("playback thread panicked");
        }
        // Unblock the keyboard listener and restore the terminal
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = keyboard {
            match handle.join() {
                Ok(Err(e)) => warn!(error = %e, "keyboard listener failed"),
                Ok(Ok(())) => {}
                Err(_) => warn!("keyboard listener panicked"),
            }
        }

        let result = match failure.lock().take() {
            Some(e) => Err(e),
            None => Ok(()),
        };
        result
    }

    /// Pause playback; valid only while playing
    pub fn pause(&self) -> Result<(), PlaybackError> {
        {
            let mut state = self.state.lock();
            if !state.is_playing {
                return Err(PlaybackError::InvalidStateTransition {
                    action: "pause",
                    state: if state.is_paused { "paused" } else { "idle" },
                });
            }
            state.is_playing = false;
            state.is_paused = true;
        }
        self.output.pause();
        info!("paused");
        Ok(())
    }

    /// Resume playback; valid only while paused
    pub fn resume(&self) -> Result<(), PlaybackError> {
        {
            let mut state = self.state.lock();
            if !state.is_paused {
                return Err(PlaybackError::InvalidStateTransition {
                    action: "resume",
                    state: if state.is_playing { "playing" } else { "idle" },
                });
            }
            state.is_paused = false;
            state.is_playing = true;
        }
        self.output.resume();
        info!("resumed");
        Ok(())
    }

    /// Seek relative to the current position, clamped at 0
    ///
    /// Scoped to the currently loaded chunk in streaming mode; the output
    /// device cannot seek across chunk boundaries.
    pub fn seek(&self, delta_seconds: i64) -> Result<(), PlaybackError> {
        if !self.state.lock().is_active() {
            return Err(PlaybackError::InvalidStateTransition {
                action: "seek",
                state: "idle",
            });
        }
        let current = self.output.status().position_ms;
        let target = (current as i64 + delta_seconds * 1000).max(0) as u64;
        debug!(current, target, "seek");
        self.output.seek(target)
    }

    /// Request a speed change
    ///
    /// The output device cannot change speed mid-stream, so this surfaces a
    /// notice instead of mutating state; it still requires an active
    /// session.
    pub fn adjust_speed(&self, delta: f32) -> Result<(), PlaybackError> {
        if !self.state.lock().is_active() {
            return Err(PlaybackError::InvalidStateTransition {
                action: "adjust speed",
                state: "idle",
            });
        }
        info!(delta, "speed changes apply from the next session; restart to take effect");
        Ok(())
    }

    /// Stop the session unconditionally; idempotent
    pub fn quit(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.output.stop();
        info!("quit requested");
    }

    /// Drain the command queue until shutdown or natural completion
    fn run_command_loop(&self, commands: Receiver<Command>) {
        loop {
            match commands.recv_timeout(COMMAND_TIMEOUT) {
                Ok(Command::Quit) => {
                    self.quit();
                    break;
                }
                Ok(command) => {
                    // A stray key press must never end the session
                    if let Err(e) = self.dispatch(command) {
                        warn!(?command, error = %e, "command ignored");
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    if !self.state.lock().is_active() {
                        debug!("playback finished naturally");
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn dispatch(&self, command: Command) -> Result<(), PlaybackError> {
        match command {
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::Seek(delta) => self.seek(delta),
            Command::SpeedAdjust(delta) => self.adjust_speed(delta),
            Command::Quit => unreachable!("Quit is handled by the command loop"),
        }
    }
}

/// Fixed-buffer mode: one blocking play; output failure fails the session
fn play_fixed_buffer(
    output: &dyn AudioOutput,
    state: &Mutex<PlaybackState>,
    audio: &[u8],
) -> Result<(), PlaybackError> {
    if let Some(duration) = wav_duration_ms(audio) {
        state.lock().duration_ms = duration;
    }
    output.play(audio)
}

/// Streaming mode: consume chunks in index order, polling for readiness
///
/// Failed chunks are skipped with a warning; output errors skip to the next
/// chunk rather than ending the session. Stops the synthesizer on the way
/// out so shutdown is cooperative in both directions.
fn play_stream(
    output: &dyn AudioOutput,
    state: &Mutex<PlaybackState>,
    shutdown: &AtomicBool,
    synthesizer: &ChunkSynthesizer,
) -> Result<(), PlaybackError> {
    let total = synthesizer.chunk_count();
    let mut index = 0;

    while index < total && !shutdown.load(Ordering::SeqCst) {
        let chunk = match synthesizer.get_next_chunk() {
            Some(chunk) => chunk,
            None => match synthesizer.chunk_status(index)? {
                ChunkStatus::Failed => {
                    warn!(index, "skipping failed chunk");
                    index += 1;
                    continue;
                }
                ChunkStatus::Completed => {
                    // Completed but squeezed out of the full ready-buffer
                    synthesizer.synthesize_chunk_on_demand(index)?
                }
                ChunkStatus::Pending | ChunkStatus::InProgress => {
                    debug!(index, "buffering...");
                    thread::sleep(CHUNK_POLL_INTERVAL);
                    continue;
                }
            },
        };

        let chunk_index = chunk.index;
        let Some(audio) = chunk.audio else {
            index = chunk_index + 1;
            continue;
        };

        {
            let mut state = state.lock();
            state.current_chunk = Some(chunk_index);
            state.duration_ms = chunk.duration_ms.unwrap_or(0);
        }
        debug!(index = chunk_index, "playing chunk");

        if let Err(e) = output.play(&audio) {
            warn!(index = chunk_index, error = %e, "output error, continuing with next chunk");
        }
        index = chunk_index + 1;
    }

    synthesizer.stop();
    Ok(())
}
