//! Chunk synthesizer: background worker pool + bounded ready-buffer
//!
//! Owns the ordered chunk list for one synthesis session. Chunk 0 is
//! synthesized synchronously so the caller knows exactly when first audio is
//! ready; the rest fan out across a small worker pool. A single mutex guards
//! the chunk list and the ready-buffer: claiming a chunk (Pending ->
//! InProgress) and buffer insertion/removal are atomic critical sections,
//! and engine calls always happen outside the lock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use narrate_core::{Chunk, ChunkStatus, PlaybackState};

use super::chunker::{chunk_text, DEFAULT_TARGET_WORDS};
use super::SynthesisEngine;
use crate::PipelineError;

/// Maximum number of completed chunks held for the consumer
pub const READY_BUFFER_CAPACITY: usize = 10;

/// Default background worker count
pub const DEFAULT_WORKER_COUNT: usize = 2;

/// Poll interval while waiting for an in-flight chunk to resolve
const CLAIM_WAIT_INTERVAL: Duration = Duration::from_millis(10);

/// Synthesizer configuration
#[derive(Debug, Clone)]
pub struct SynthesizerConfig {
    /// Target chunk size in words
    pub target_words: usize,
    /// Background worker count
    pub worker_count: usize,
    /// Synthesis speed (0.5-2.0), fixed for the whole session
    pub speed: f32,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            target_words: DEFAULT_TARGET_WORDS,
            worker_count: DEFAULT_WORKER_COUNT,
            speed: 1.0,
        }
    }
}

/// Ready-buffer fill level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStatus {
    /// Completed chunks waiting for the consumer
    pub buffered: usize,
    /// Total chunks in the session
    pub total: usize,
}

/// Chunk list + ready-buffer, guarded as one mutual-exclusion domain
struct Session {
    chunks: Vec<Chunk>,
    /// Indices of completed chunks awaiting consumption, kept in index order
    ready: VecDeque<usize>,
    /// Next index the consumer has not yet taken
    next_index: usize,
}

impl Session {
    /// Append to the ready-buffer if there is room, preserving index order
    ///
    /// Workers can complete out of index order; ordered insertion plus the
    /// consumption cursor keep hand-off strictly index-increasing anyway.
    fn buffer_completed(&mut self, index: usize) {
        if index < self.next_index {
            // Consumer already moved past this chunk (on-demand or skip)
            return;
        }
        if self.ready.len() >= READY_BUFFER_CAPACITY {
            debug!(index, "ready-buffer full, leaving chunk in place");
            return;
        }
        let pos = self.ready.partition_point(|&i| i < index);
        self.ready.insert(pos, index);
    }

    /// Record that the consumer has everything up to and including `index`
    fn advance_cursor(&mut self, index: usize) {
        self.next_index = self.next_index.max(index + 1);
        while matches!(self.ready.front(), Some(&front) if front < self.next_index) {
            self.ready.pop_front();
        }
    }
}

/// Turns an ordered chunk list into progressively available audio
pub struct ChunkSynthesizer {
    engine: Arc<dyn SynthesisEngine>,
    config: SynthesizerConfig,
    session: Arc<Mutex<Session>>,
    shutdown: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ChunkSynthesizer {
    /// Create a synthesizer over the given engine
    pub fn new(engine: Arc<dyn SynthesisEngine>, config: SynthesizerConfig) -> Self {
        let speed = PlaybackState::clamp_speed(config.speed);
        Self {
            engine,
            config: SynthesizerConfig { speed, ..config },
            session: Arc::new(Mutex::new(Session {
                chunks: Vec::new(),
                ready: VecDeque::new(),
                next_index: 0,
            })),
            shutdown: Arc::new(AtomicBool::new(false)),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Chunk the text and reset session state
    ///
    /// Stops any workers left over from a previous session before swapping
    /// the chunk list. Fails with `EmptyText` for whitespace-only input.
    pub fn prepare_chunks(&self, text: &str) -> Result<usize, PipelineError> {
        self.stop();

        let chunks = chunk_text(text, self.config.target_words)?;
        let count = chunks.len();

        let mut session = self.session.lock();
        session.chunks = chunks;
        session.ready.clear();
        session.next_index = 0;
        drop(session);

        self.shutdown.store(false, Ordering::SeqCst);
        info!(chunks = count, "prepared synthesis session");
        Ok(count)
    }

    /// Synchronously synthesize chunk 0
    ///
    /// This call's wall-clock cost is the session's time-to-first-audio; it
    /// is deliberately not hidden behind background work. Engine failure
    /// here propagates, since nothing can play without a first chunk.
    pub fn synthesize_first_chunk(&self) -> Result<(), PipelineError> {
        let text = {
            let mut session = self.session.lock();
            let chunk = session
                .chunks
                .first_mut()
                .ok_or(PipelineError::NoChunksPrepared)?;
            chunk.status = ChunkStatus::InProgress;
            chunk.text.clone()
        };

        match self.engine.synthesize(&text, self.config.speed) {
            Ok(audio) => {
                let mut session = self.session.lock();
                session.chunks[0].complete(audio);
                session.buffer_completed(0);
                debug!(duration_ms = ?session.chunks[0].duration_ms, "first chunk ready");
                Ok(())
            }
            Err(e) => {
                self.session.lock().chunks[0].fail();
                Err(e.into())
            }
        }
    }

    /// Spawn the background worker pool
    ///
    /// Each worker scans forward from its last position for the next
    /// `Pending` chunk, claims it under the lock, synthesizes outside the
    /// lock, then records the result and buffers it if there is room. A
    /// failed chunk is recorded and skipped; workers exit when no `Pending`
    /// chunks remain or shutdown is requested.
    pub fn start_background_synthesis(&self) {
        let mut workers = self.workers.lock();
        for worker_id in 0..self.config.worker_count.max(1) {
            let engine = Arc::clone(&self.engine);
            let session = Arc::clone(&self.session);
            let shutdown = Arc::clone(&self.shutdown);
            let speed = self.config.speed;

            workers.push(thread::spawn(move || {
                let mut cursor = 0usize;
                loop {
                    if shutdown.load(Ordering::SeqCst) {
                        break;
                    }

                    let claimed = {
                        let mut session = session.lock();
                        let mut found = None;
                        while cursor < session.chunks.len() {
                            if session.chunks[cursor].status == ChunkStatus::Pending {
                                session.chunks[cursor].status = ChunkStatus::InProgress;
                                found = Some((cursor, session.chunks[cursor].text.clone()));
                                break;
                            }
                            cursor += 1;
                        }
                        found
                    };

                    let Some((index, text)) = claimed else {
                        debug!(worker_id, "no pending chunks left, worker exiting");
                        break;
                    };

                    match engine.synthesize(&text, speed) {
                        Ok(audio) => {
                            let mut session = session.lock();
                            session.chunks[index].complete(audio);
                            session.buffer_completed(index);
                        }
                        Err(e) => {
                            warn!(index, error = %e, "chunk synthesis failed, skipping");
                            session.lock().chunks[index].fail();
                        }
                    }
                }
            }));
        }
        info!(workers = workers.len(), "background synthesis started");
    }

    /// Pop the next completed chunk from the ready-buffer, if any
    ///
    /// Non-blocking; the caller is responsible for waiting or polling.
    /// Hands chunks out strictly by increasing index: a buffered chunk
    /// ahead of the consumption cursor stays put until its predecessors
    /// have been taken (or consumed on demand / skipped as failed).
    pub fn get_next_chunk(&self) -> Option<Chunk> {
        let mut session = self.session.lock();
        loop {
            let front = *session.ready.front()?;
            if front < session.next_index {
                // Stale: already consumed through another path
                session.ready.pop_front();
                continue;
            }
            if front > session.next_index {
                // Step over failed chunks; they never enter the buffer
                if session.chunks[session.next_index].status == ChunkStatus::Failed {
                    session.next_index += 1;
                    continue;
                }
                return None;
            }
            session.ready.pop_front();
            session.next_index += 1;
            return Some(session.chunks[front].clone());
        }
    }

    /// Synchronously synthesize a specific chunk, bypassing the buffer
    ///
    /// Returns the chunk's existing audio when it is already `Completed`.
    /// An `InProgress` chunk (claimed by a worker) is waited on rather than
    /// claimed twice; `Pending` and `Failed` chunks are claimed and
    /// synthesized in place.
    pub fn synthesize_chunk_on_demand(&self, index: usize) -> Result<Chunk, PipelineError> {
        loop {
            let text = {
                let mut session = self.session.lock();
                let chunk = session
                    .chunks
                    .get_mut(index)
                    .ok_or(PipelineError::IndexOutOfRange(index))?;
                match chunk.status {
                    ChunkStatus::Completed => {
                        let chunk = chunk.clone();
                        session.advance_cursor(index);
                        return Ok(chunk);
                    }
                    ChunkStatus::InProgress => None,
                    ChunkStatus::Pending | ChunkStatus::Failed => {
                        chunk.status = ChunkStatus::InProgress;
                        Some(chunk.text.clone())
                    }
                }
            };

            // Another actor holds the claim; wait for it to resolve.
            let Some(text) = text else {
                thread::sleep(CLAIM_WAIT_INTERVAL);
                continue;
            };

            return match self.engine.synthesize(&text, self.config.speed) {
                Ok(audio) => {
                    let mut session = self.session.lock();
                    session.chunks[index].complete(audio);
                    session.advance_cursor(index);
                    Ok(session.chunks[index].clone())
                }
                Err(e) => {
                    self.session.lock().chunks[index].fail();
                    Err(e.into())
                }
            };
        }
    }

    /// Status of a single chunk
    pub fn chunk_status(&self, index: usize) -> Result<ChunkStatus, PipelineError> {
        self.session
            .lock()
            .chunks
            .get(index)
            .map(|c| c.status)
            .ok_or(PipelineError::IndexOutOfRange(index))
    }

    /// Total chunks in the session
    pub fn chunk_count(&self) -> usize {
        self.session.lock().chunks.len()
    }

    /// Ready-buffer fill level
    pub fn buffer_status(&self) -> BufferStatus {
        let session = self.session.lock();
        BufferStatus {
            buffered: session.ready.len(),
            total: session.chunks.len(),
        }
    }

    /// Request shutdown, wait for workers, and drain the ready-buffer
    ///
    /// Idempotent; safe to call repeatedly or when never started. An
    /// in-flight engine call is not preempted; this returns after the
    /// current call completes and the worker observes the flag.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);

        let handles: Vec<_> = self.workers.lock().drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                warn!("synthesis worker panicked during shutdown");
            }
        }

        self.session.lock().ready.clear();
    }
}

impl Drop for ChunkSynthesizer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tts::StubEngine;

    fn synthesizer(target_words: usize) -> ChunkSynthesizer {
        ChunkSynthesizer::new(
            Arc::new(StubEngine::default()),
            SynthesizerConfig {
                target_words,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_first_chunk_before_prepare_fails() {
        let synth = synthesizer(150);
        assert!(matches!(
            synth.synthesize_first_chunk(),
            Err(PipelineError::NoChunksPrepared)
        ));
    }

    #[test]
    fn test_prepare_rejects_empty_text() {
        let synth = synthesizer(150);
        assert!(matches!(
            synth.prepare_chunks("  "),
            Err(PipelineError::EmptyText)
        ));
    }

    #[test]
    fn test_first_chunk_is_buffered() {
        let synth = synthesizer(150);
        synth.prepare_chunks("Hello there. How are you?").unwrap();
        synth.synthesize_first_chunk().unwrap();

        assert_eq!(synth.chunk_status(0).unwrap(), ChunkStatus::Completed);
        let chunk = synth.get_next_chunk().unwrap();
        assert_eq!(chunk.index, 0);
        assert!(chunk.audio.is_some());
        assert!(chunk.duration_ms.is_some());
    }

    #[test]
    fn test_on_demand_out_of_range() {
        let synth = synthesizer(150);
        synth.prepare_chunks("One sentence only.").unwrap();
        assert!(matches!(
            synth.synthesize_chunk_on_demand(5),
            Err(PipelineError::IndexOutOfRange(5))
        ));
        // No chunk was mutated
        assert_eq!(synth.chunk_status(0).unwrap(), ChunkStatus::Pending);
    }

    #[test]
    fn test_on_demand_synthesizes_in_place() {
        let synth = synthesizer(3);
        synth
            .prepare_chunks("First bit here. Second bit here. Third bit here.")
            .unwrap();

        let chunk = synth.synthesize_chunk_on_demand(2).unwrap();
        assert_eq!(chunk.index, 2);
        assert!(chunk.audio.is_some());
        assert_eq!(synth.chunk_status(2).unwrap(), ChunkStatus::Completed);
        // Bypasses the buffer
        assert_eq!(synth.buffer_status().buffered, 0);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let synth = synthesizer(150);
        synth.stop();
        synth.prepare_chunks("A word.").unwrap();
        synth.stop();
        synth.stop();
        assert_eq!(synth.buffer_status().buffered, 0);
    }

    #[test]
    fn test_single_chunk_session_workers_exit() {
        let synth = synthesizer(150);
        // 40 words -> one chunk
        let text = (0..39).fold("Go".to_string(), |acc, i| format!("{acc} w{i}")) + ".";
        assert_eq!(synth.prepare_chunks(&text).unwrap(), 1);
        synth.synthesize_first_chunk().unwrap();

        // No pending chunks remain, so workers exit immediately
        synth.start_background_synthesis();
        synth.stop();
        assert_eq!(synth.chunk_status(0).unwrap(), ChunkStatus::Completed);
    }
}
