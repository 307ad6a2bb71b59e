//! Bounded chunk pool
//!
//! The pool limits how far the decoder may run ahead of the playback
//! worker: once every slot is out (queued in a pipe or held by the player),
//! [`MusicBuffer::allocate`] returns `None` until a chunk is recycled.
//! Sample storage of recycled chunks is reused.

use super::types::MusicChunk;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::trace;

struct PoolState {
    /// Chunks currently allocated (not yet recycled)
    outstanding: usize,

    /// Cleared sample vectors ready for reuse
    spare: Vec<Vec<f32>>,
}

/// Bounded pool of [`MusicChunk`] slots
pub struct MusicBuffer {
    /// Maximum number of chunks out at the same time
    capacity: usize,

    /// Interleaved samples per chunk
    chunk_samples: usize,

    state: Mutex<PoolState>,
}

impl MusicBuffer {
    /// Create a pool of `capacity` chunks holding `chunk_samples` samples each
    ///
    /// Both values are clamped to at least 1.
    pub fn new(capacity: usize, chunk_samples: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            chunk_samples: chunk_samples.max(1),
            state: Mutex::new(PoolState {
                outstanding: 0,
                spare: Vec::new(),
            }),
        }
    }

    pub fn from_config(config: &cadence_common::config::DecoderConfig) -> Self {
        Self::new(config.buffer_chunks, config.chunk_samples)
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn chunk_samples(&self) -> usize {
        self.chunk_samples
    }

    /// Number of slots that can still be allocated
    pub fn available(&self) -> usize {
        self.capacity - self.lock().outstanding
    }

    /// Take a free chunk, or `None` when the pool is exhausted
    pub fn allocate(&self) -> Option<MusicChunk> {
        let mut state = self.lock();
        if state.outstanding >= self.capacity {
            trace!("Chunk pool exhausted ({} chunks out)", state.outstanding);
            return None;
        }
        state.outstanding += 1;

        let samples = state
            .spare
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.chunk_samples));
        Some(MusicChunk::with_storage(samples))
    }

    /// Return a chunk to the pool
    pub fn recycle(&self, chunk: MusicChunk) {
        let mut samples = chunk.samples;
        samples.clear();

        let mut state = self.lock();
        state.outstanding = state.outstanding.saturating_sub(1);
        state.spare.push(samples);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_is_bounded() {
        let pool = MusicBuffer::new(2, 16);
        let a = pool.allocate().expect("first chunk");
        let _b = pool.allocate().expect("second chunk");
        assert!(pool.allocate().is_none());
        assert_eq!(pool.available(), 0);

        pool.recycle(a);
        assert_eq!(pool.available(), 1);
        assert!(pool.allocate().is_some());
    }

    #[test]
    fn test_recycled_storage_is_cleared() {
        let pool = MusicBuffer::new(1, 4);
        let mut chunk = pool.allocate().unwrap();
        chunk.samples.extend_from_slice(&[0.5, 0.5]);
        pool.recycle(chunk);

        let chunk = pool.allocate().unwrap();
        assert!(chunk.samples.is_empty());
        assert!(chunk.tag.is_none());
    }

    #[test]
    fn test_zero_sizes_are_clamped() {
        let pool = MusicBuffer::new(0, 0);
        assert_eq!(pool.capacity(), 1);
        assert_eq!(pool.chunk_samples(), 1);
    }
}
