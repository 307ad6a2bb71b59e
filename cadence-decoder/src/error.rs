//! Error types for cadence-decoder
//!
//! [`Error`] is returned by the controller facade, input streams and codec
//! plugins. [`SessionError`] describes why a decode session ended in the
//! `Error` state; it is stored in the control block and cloned out to
//! callers.

use thiserror::Error;

/// Main error type for cadence-decoder
#[derive(Error, Debug)]
pub enum Error {
    /// Operation not allowed in the current decoder state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// `start` was called while the destination pipe still held chunks
    #[error("Music pipe is not empty")]
    PipeNotEmpty,

    /// The decoder thread was never spawned or has already quit
    #[error("Decoder thread is not running")]
    NotRunning,

    /// Input stream open/buffer/read errors
    #[error("Input error: {0}")]
    Input(String),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Plugin does not handle this input or decode mode
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from shared cadence code (configuration, URI mapping)
    #[error(transparent)]
    Common(#[from] cadence_common::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using cadence-decoder Error
pub type Result<T> = std::result::Result<T, Error>;

/// Reason a decode session ended in the `Error` state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The song could not be mapped to a playable URI
    #[error("cannot resolve {uri}: {reason}")]
    Resolve { uri: String, reason: String },

    /// `start` did not hand over an output buffer and pipe
    #[error("no output pipe for {uri}")]
    NoOutput { uri: String },

    /// The input stream could not be opened
    #[error("cannot open {uri}: {reason}")]
    Open { uri: String, reason: String },

    /// The input stream failed while waiting to become ready
    #[error("input failed while buffering {uri}: {reason}")]
    Buffer { uri: String, reason: String },

    /// Every candidate plugin declined the input
    #[error("no decoder plugin accepted {uri}")]
    NoPlugin { uri: String },

    /// A plugin accepted the input and then failed
    #[error("decoding {uri} with {plugin} failed: {reason}")]
    Decode {
        uri: String,
        plugin: String,
        reason: String,
    },
}
