//! WAV inspection helpers

use std::io::Cursor;

/// Playback duration of encoded WAV bytes, in milliseconds
///
/// Returns `None` when the bytes are not a parseable WAV stream; callers
/// treat the duration as informational and must not rely on it.
pub fn wav_duration_ms(bytes: &[u8]) -> Option<u64> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).ok()?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return None;
    }
    let frames = reader.duration() as u64;
    Some(frames * 1000 / spec.sample_rate as u64)
}
