//! Audio output capability
//!
//! The controller never touches a device API directly; everything goes
//! through [`AudioOutput`] so sessions own an explicitly constructed device
//! and tests substitute a recording double. The production implementation is
//! rodio-backed.

use std::io::Cursor;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use rodio::{OutputStreamBuilder, Sink};
use tracing::{debug, warn};

use narrate_core::wav_duration_ms;

use crate::PlaybackError;

/// Live output device status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputStatus {
    pub is_playing: bool,
    pub is_paused: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
}

/// Audio playback capability
///
/// `play` blocks until the buffer finishes (or the device is stopped); the
/// control methods are cheap and callable from another thread. Runtime
/// speed change is not supported; speed is fixed before synthesis.
pub trait AudioOutput: Send + Sync {
    /// Play encoded audio to completion; blocks the calling thread
    fn play(&self, audio: &[u8]) -> Result<(), PlaybackError>;

    /// Pause the current buffer
    fn pause(&self);

    /// Resume a paused buffer
    fn resume(&self);

    /// Stop unconditionally, discarding the current buffer
    fn stop(&self);

    /// Jump to an absolute position within the current buffer
    fn seek(&self, position_ms: u64) -> Result<(), PlaybackError>;

    /// Set output volume (0-100)
    fn set_volume(&self, volume: u8);

    /// Current device status
    fn status(&self) -> OutputStatus;
}

/// Rodio-backed output device
///
/// The cpal stream behind rodio's `OutputStream` is not `Send`, so a
/// dedicated thread owns it for the lifetime of this value and hands back
/// the `Sink`, which is. Dropping the device releases the thread and the
/// stream with it.
pub struct RodioOutput {
    sink: Sink,
    duration_ms: Mutex<u64>,
    _keepalive: mpsc::Sender<()>,
}

impl RodioOutput {
    /// Open the default output device
    pub fn new() -> Result<Self, PlaybackError> {
        let (sink_tx, sink_rx) = mpsc::channel();
        let (keepalive_tx, keepalive_rx) = mpsc::channel::<()>();

        thread::spawn(move || {
            let stream = match OutputStreamBuilder::open_default_stream() {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = sink_tx.send(Err(e.to_string()));
                    return;
                }
            };
            let sink = Sink::connect_new(stream.mixer());
            if sink_tx.send(Ok(sink)).is_err() {
                return;
            }
            // Blocks until the sender half drops, keeping the stream alive
            let _ = keepalive_rx.recv();
            debug!("audio output stream released");
        });

        let sink = sink_rx
            .recv()
            .map_err(|_| PlaybackError::Output("audio thread exited".to_string()))?
            .map_err(PlaybackError::Output)?;

        Ok(Self {
            sink,
            duration_ms: Mutex::new(0),
            _keepalive: keepalive_tx,
        })
    }
}

impl AudioOutput for RodioOutput {
    fn play(&self, audio: &[u8]) -> Result<(), PlaybackError> {
        let source = rodio::Decoder::new(Cursor::new(audio.to_vec()))
            .map_err(|e| PlaybackError::Output(e.to_string()))?;

        *self.duration_ms.lock() = wav_duration_ms(audio).unwrap_or(0);

        self.sink.append(source);
        self.sink.sleep_until_end();
        Ok(())
    }

    fn pause(&self) {
        self.sink.pause();
    }

    fn resume(&self) {
        self.sink.play();
    }

    fn stop(&self) {
        self.sink.stop();
    }

    fn seek(&self, position_ms: u64) -> Result<(), PlaybackError> {
        self.sink
            .try_seek(Duration::from_millis(position_ms))
            .map_err(|e| {
                warn!(position_ms, error = %e, "seek rejected by device");
                PlaybackError::Output(e.to_string())
            })
    }

    fn set_volume(&self, volume: u8) {
        self.sink.set_volume(volume.min(100) as f32 / 100.0);
    }

    fn status(&self) -> OutputStatus {
        let has_audio = !self.sink.empty();
        OutputStatus {
            is_playing: has_audio && !self.sink.is_paused(),
            is_paused: has_audio && self.sink.is_paused(),
            position_ms: self.sink.get_pos().as_millis() as u64,
            duration_ms: *self.duration_ms.lock(),
        }
    }
}
