//! Input streams
//!
//! An input stream is the byte source a codec plugin reads from. Remote
//! streams may need buffering before they become ready (and before their
//! MIME type is known); local files are ready as soon as they are open.
//!
//! Streams are shared through [`InputHandle`] so a codec library can own a
//! reader while the decode session keeps the ability to rewind and close
//! the stream.

pub mod file;

use crate::error::Result;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use file::{FileInputStream, LocalInputOpener};

/// A byte source
pub trait InputStream: Send {
    /// URI this stream was opened from
    fn uri(&self) -> &str;

    /// True once metadata (MIME type, size, seekability) is available
    fn is_ready(&self) -> bool;

    /// Make progress on buffering
    ///
    /// May block for a bounded amount of time waiting for data. Returns
    /// `Ok(true)` when new data became available.
    fn buffer(&mut self) -> Result<bool>;

    /// MIME type reported by the source, if any
    fn mime_type(&self) -> Option<&str> {
        None
    }

    fn is_seekable(&self) -> bool;

    /// Total size in bytes, if known
    fn size(&self) -> Option<u64>;

    /// Current read position in bytes
    fn offset(&self) -> u64;

    fn seek(&mut self, offset: u64) -> Result<()>;

    /// Read buffered bytes
    ///
    /// Returns `Ok(0)` at end of stream, and also when no data is buffered
    /// yet; callers tell the two apart with [`InputStream::is_eof`].
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    fn is_eof(&self) -> bool;

    /// Release the underlying resource; further reads return end of stream
    fn close(&mut self) {}
}

/// Opens input streams by URI
pub trait InputOpener: Send + Sync {
    fn open(&self, uri: &str) -> Result<Box<dyn InputStream>>;
}

/// Shared handle to an open input stream
#[derive(Clone)]
pub struct InputHandle {
    inner: Arc<Mutex<Box<dyn InputStream>>>,
}

impl InputHandle {
    pub fn new(stream: Box<dyn InputStream>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(stream)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn InputStream>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn uri(&self) -> String {
        self.lock().uri().to_string()
    }

    pub fn is_ready(&self) -> bool {
        self.lock().is_ready()
    }

    pub fn buffer(&self) -> Result<bool> {
        self.lock().buffer()
    }

    pub fn mime_type(&self) -> Option<String> {
        self.lock().mime_type().map(str::to_string)
    }

    pub fn is_seekable(&self) -> bool {
        self.lock().is_seekable()
    }

    pub fn size(&self) -> Option<u64> {
        self.lock().size()
    }

    pub fn offset(&self) -> u64 {
        self.lock().offset()
    }

    pub fn seek(&self, offset: u64) -> Result<()> {
        self.lock().seek(offset)
    }

    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.lock().read(buf)
    }

    pub fn is_eof(&self) -> bool {
        self.lock().is_eof()
    }

    pub fn close(&self) {
        self.lock().close()
    }
}
