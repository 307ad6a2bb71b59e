//! Codec plugins
//!
//! A plugin advertises the MIME types and filename suffixes it handles and
//! implements one or both decode modes:
//! - stream decode: reads from an [`InputHandle`] opened by the session
//! - file decode: opens a local path itself
//!
//! A plugin accepts an input by calling [`Decoder::initialized`]; returning
//! before that (with `Ok` or `Err`) declines it and the session moves on to
//! the next candidate.

pub mod registry;
pub mod selector;
pub mod symphonia;

use crate::decoder::Decoder;
use crate::error::{Error, Result};
use crate::input::InputHandle;
use std::path::Path;

pub use registry::PluginRegistry;
pub use selector::{select, Candidate, DecodeMode, MatchPhase, SourceInfo};
pub use self::symphonia::SymphoniaPlugin;

/// A decoding capability
pub trait DecoderPlugin: Send + Sync {
    /// Unique plugin name (used for the fallback lookup and configuration)
    fn name(&self) -> &str;

    /// Filename suffixes handled, without the dot
    fn suffixes(&self) -> &[&str] {
        &[]
    }

    /// MIME types handled
    fn mime_types(&self) -> &[&str] {
        &[]
    }

    fn supports_stream(&self) -> bool {
        false
    }

    fn supports_file(&self) -> bool {
        false
    }

    /// Decode from an input stream that is ready and rewound to offset 0
    fn stream_decode(&self, decoder: &mut Decoder, input: InputHandle) -> Result<()> {
        let _ = (decoder, input);
        Err(Error::Unsupported(format!("{} cannot decode streams", self.name())))
    }

    /// Decode a local file by absolute path
    fn file_decode(&self, decoder: &mut Decoder, path: &Path) -> Result<()> {
        let _ = (decoder, path);
        Err(Error::Unsupported(format!("{} cannot decode files", self.name())))
    }

    /// Case-insensitive suffix match
    fn handles_suffix(&self, suffix: &str) -> bool {
        self.suffixes().iter().any(|s| s.eq_ignore_ascii_case(suffix))
    }

    /// MIME match ignoring parameters (`audio/mpeg; charset=x` matches `audio/mpeg`)
    fn handles_mime_type(&self, mime_type: &str) -> bool {
        let base = mime_type.split(';').next().unwrap_or_default().trim();
        !base.is_empty() && self.mime_types().iter().any(|m| m.eq_ignore_ascii_case(base))
    }
}
