//! `std::io` adapter over a session's input stream
//!
//! Codec libraries want `Read + Seek`. The reader buffers while no data is
//! available and reports end of stream as soon as a `Stop` command arrives,
//! so a plugin blocked inside its codec library still honours stop requests.

use super::control::{DecodeCommand, DecoderControl};
use crate::input::InputHandle;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

pub struct DecoderReader {
    control: Arc<DecoderControl>,
    input: InputHandle,
}

fn to_io(err: crate::error::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}

impl DecoderReader {
    pub(crate) fn new(control: Arc<DecoderControl>, input: InputHandle) -> Self {
        Self { control, input }
    }

    pub fn input(&self) -> &InputHandle {
        &self.input
    }

    fn stop_requested(&self) -> bool {
        self.control.lock().command() == DecodeCommand::Stop
    }
}

impl Read for DecoderReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if self.stop_requested() {
                return Ok(0);
            }

            let n = self.input.read(buf).map_err(to_io)?;
            if n > 0 || self.input.is_eof() {
                return Ok(n);
            }
            self.input.buffer().map_err(to_io)?;
        }
    }
}

impl Seek for DecoderReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.input.offset().checked_add_signed(delta),
            SeekFrom::End(delta) => {
                let size = self.input.size().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::Unsupported, "stream size is unknown")
                })?;
                size.checked_add_signed(delta)
            }
        }
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "seek before start of stream"))?;

        if target != self.input.offset() {
            self.input.seek(target).map_err(to_io)?;
        }
        Ok(self.input.offset())
    }
}
