//! Ordered chunk queue between the decoder and the playback worker
//!
//! The decoder pushes chunks in decode order; the playback worker shifts
//! them off the front. The pipe has its own lock and condition variable so
//! the consumer can wait for data without touching the decoder control
//! block.

use super::buffer::MusicBuffer;
use super::types::MusicChunk;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// FIFO of decoded chunks
#[derive(Default)]
pub struct MusicPipe {
    chunks: Mutex<VecDeque<MusicChunk>>,
    cond: Condvar,
}

impl MusicPipe {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<MusicChunk>> {
        self.chunks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a chunk and wake a waiting consumer
    pub fn push(&self, chunk: MusicChunk) {
        self.lock().push_back(chunk);
        self.cond.notify_all();
    }

    /// Remove the oldest chunk
    pub fn shift(&self) -> Option<MusicChunk> {
        self.lock().pop_front()
    }

    /// Remove the oldest chunk, waiting up to `timeout` for one to arrive
    pub fn shift_timeout(&self, timeout: Duration) -> Option<MusicChunk> {
        let guard = self.lock();
        let (mut guard, _) = self
            .cond
            .wait_timeout_while(guard, timeout, |chunks| chunks.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        guard.pop_front()
    }

    /// Drop every queued chunk, returning them to `buffer`
    pub fn clear(&self, buffer: &MusicBuffer) {
        let drained: Vec<MusicChunk> = self.lock().drain(..).collect();
        for chunk in drained {
            buffer.recycle(chunk);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
