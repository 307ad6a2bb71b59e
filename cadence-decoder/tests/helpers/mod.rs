//! Test helper modules for cadence-decoder integration tests
//!
//! Provides reusable test infrastructure components:
//! - Harness: control block plus running decoder thread and output pipe
//! - Scripted input streams and codec plugins
//! - WAV generation for end-to-end symphonia decoding

#![allow(dead_code)]

pub mod audio_generator;
pub mod scripted;

pub use audio_generator::{
    frames_for, generate_sine_wav, sine_sample, sine_wav_bytes, TEST_SAMPLE_RATE,
};
pub use scripted::{calls, Behavior, CallLog, ScriptedOpener, ScriptedPlugin, StreamSpec};

use cadence_common::{Song, SongRef};
use cadence_decoder::audio::{MusicBuffer, MusicChunk, MusicPipe};
use cadence_decoder::decoder::MusicDirectoryMapper;
use cadence_decoder::input::InputOpener;
use cadence_decoder::plugins::PluginRegistry;
use cadence_decoder::{DecodeState, DecoderControl, DecoderWorker, Result};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default wait limit for state transitions
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// A running decoder thread with its output pipe
pub struct Harness {
    pub control: Arc<DecoderControl>,
    pub buffer: Arc<MusicBuffer>,
    pub pipe: Arc<MusicPipe>,
}

impl Harness {
    /// Spawn a decoder with a small pool (4 chunks of 64 samples)
    pub fn spawn(registry: PluginRegistry, opener: Arc<dyn InputOpener>, fallback: &str) -> Self {
        Self::with_pool(registry, opener, fallback, 4, 64)
    }

    pub fn with_pool(
        registry: PluginRegistry,
        opener: Arc<dyn InputOpener>,
        fallback: &str,
        chunks: usize,
        chunk_samples: usize,
    ) -> Self {
        let control = Arc::new(DecoderControl::new());
        let mapper = Arc::new(MusicDirectoryMapper::new(Some("/music".into())));
        DecoderWorker::new(registry, opener, mapper)
            .with_fallback_plugin(fallback)
            .spawn(&control)
            .expect("spawn decoder thread");

        Self {
            control,
            buffer: Arc::new(MusicBuffer::new(chunks, chunk_samples)),
            pipe: Arc::new(MusicPipe::new()),
        }
    }

    pub fn start(&self, uri: &str) -> Result<()> {
        self.start_range(uri, 0, 0)
    }

    pub fn start_song(&self, song: SongRef) -> Result<()> {
        self.control.start(song, 0, 0, Arc::clone(&self.buffer), Arc::clone(&self.pipe))
    }

    pub fn start_range(&self, uri: &str, start_ms: u64, end_ms: u64) -> Result<()> {
        self.control.start(
            Song::new(uri).into_ref(),
            start_ms,
            end_ms,
            Arc::clone(&self.buffer),
            Arc::clone(&self.pipe),
        )
    }

    /// Wait until the decoder reaches `state`
    pub fn wait_for(&self, state: DecodeState) {
        let deadline = Instant::now() + TIMEOUT;
        while self.control.state() != state {
            assert!(
                Instant::now() < deadline,
                "timed out waiting for {:?}, state is {:?}",
                state,
                self.control.state()
            );
            thread::sleep(Duration::from_millis(2));
        }
    }

    /// Wait until the running session has ended
    pub fn wait_idle(&self) -> DecodeState {
        let deadline = Instant::now() + TIMEOUT;
        loop {
            let state = self.control.state();
            if state.is_idle() {
                return state;
            }
            assert!(Instant::now() < deadline, "timed out in state {:?}", state);
            thread::sleep(Duration::from_millis(2));
        }
    }

    /// Remove every queued chunk
    pub fn drain(&self) -> Vec<MusicChunk> {
        let chunks: Vec<MusicChunk> = std::iter::from_fn(|| self.pipe.shift()).collect();
        chunks
    }

    /// Drain and recycle, returning the number of frames that were queued
    pub fn drain_frames(&self) -> usize {
        let mut frames = 0;
        for chunk in self.drain() {
            frames += chunk.frames();
            self.buffer.recycle(chunk);
        }
        self.control.lock_signal();
        frames
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        // Tests that quit explicitly leave nothing to join
        let _ = self.control.quit();
    }
}
