//! Audio data handed from the decoder to the playback worker
//!
//! Decoded PCM travels in fixed-capacity [`MusicChunk`]s. Chunks are
//! allocated from a bounded [`MusicBuffer`] pool by the decoder and queued
//! in decode order on a [`MusicPipe`]; the playback worker shifts them off
//! the pipe and returns them to the pool.

pub mod buffer;
pub mod pipe;
pub mod types;

pub use buffer::MusicBuffer;
pub use pipe::MusicPipe;
pub use types::{AudioFormat, MusicChunk, ReplayGain};
