//! # Cadence Decoder Library (cadence-decoder)
//!
//! Decoding core of the cadence audio server.
//!
//! **Purpose:** Turn a queued song into a stream of decoded audio chunks for
//! the playback worker, while controller threads start, seek and stop the
//! decoder and observe its state.
//!
//! **Architecture:** One decoder thread per [`decoder::DecoderControl`].
//! Controllers talk to it through a mutex/condvar command handshake; each
//! `start` runs a decode session that opens the input, picks codec plugins
//! by MIME type, suffix or fallback, and pushes chunks into a
//! [`audio::MusicPipe`].

pub mod audio;
pub mod decoder;
pub mod error;
pub mod input;
pub mod plugins;

pub use decoder::{DecodeCommand, DecodeState, Decoder, DecoderControl, DecoderWorker};
pub use error::{Error, Result, SessionError};
