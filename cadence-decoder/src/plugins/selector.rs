//! Plugin selection
//!
//! Given what is known about an input (URI, reported MIME type, whether it
//! is a local file) the selector produces the ordered list of plugin
//! attempts for a decode session:
//!
//! - Remote inputs: stream-capable plugins matching the MIME type, then
//!   stream-capable plugins matching the URI suffix, then the named
//!   fallback plugin (for streams that carry neither).
//! - Local files: plugins matching the suffix; file decode is preferred,
//!   stream decode is used for plugins without file support.
//!
//! Registry order decides precedence inside each phase. A plugin appears at
//! most once in the result.

use super::registry::PluginRegistry;
use super::DecoderPlugin;
use cadence_common::uri;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// How a plugin is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// Read from the session's input stream
    Stream,

    /// Let the plugin open the local path itself
    File,
}

/// Why a plugin was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    MimeType,
    Suffix,
    Fallback,
}

/// One plugin attempt
#[derive(Clone)]
pub struct Candidate {
    pub plugin: Arc<dyn DecoderPlugin>,
    pub mode: DecodeMode,
    pub phase: MatchPhase,
}

impl Candidate {
    pub fn name(&self) -> &str {
        self.plugin.name()
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("plugin", &self.plugin.name())
            .field("mode", &self.mode)
            .field("phase", &self.phase)
            .finish()
    }
}

/// What the selector knows about an input
#[derive(Debug, Clone, Copy)]
pub struct SourceInfo<'a> {
    /// Resolved URI (absolute path for local files)
    pub uri: &'a str,

    /// MIME type reported by the input stream
    pub mime_type: Option<&'a str>,

    /// True for local files
    pub is_local: bool,
}

/// Ordered candidate list for `source`
pub fn select(
    registry: &PluginRegistry,
    source: &SourceInfo<'_>,
    fallback_plugin: &str,
) -> Vec<Candidate> {
    let mut selection = Selection::default();
    let suffix = uri::suffix(source.uri);

    if source.is_local {
        if let Some(suffix) = suffix {
            for plugin in registry.from_suffix(suffix) {
                if plugin.supports_file() {
                    selection.push(plugin, DecodeMode::File, MatchPhase::Suffix);
                } else if plugin.supports_stream() {
                    selection.push(plugin, DecodeMode::Stream, MatchPhase::Suffix);
                }
            }
        }
        return selection.candidates;
    }

    if let Some(mime_type) = source.mime_type {
        for plugin in registry.from_mime_type(mime_type) {
            if plugin.supports_stream() {
                selection.push(plugin, DecodeMode::Stream, MatchPhase::MimeType);
            }
        }
    }

    if let Some(suffix) = suffix {
        for plugin in registry.from_suffix(suffix) {
            if plugin.supports_stream() {
                selection.push(plugin, DecodeMode::Stream, MatchPhase::Suffix);
            }
        }
    }

    if let Some(plugin) = registry.by_name(fallback_plugin) {
        if plugin.supports_stream() {
            selection.push(plugin, DecodeMode::Stream, MatchPhase::Fallback);
        }
    }

    selection.candidates
}

#[derive(Default)]
struct Selection {
    candidates: Vec<Candidate>,
    seen: HashSet<String>,
}

impl Selection {
    fn push(&mut self, plugin: &Arc<dyn DecoderPlugin>, mode: DecodeMode, phase: MatchPhase) {
        if self.seen.insert(plugin.name().to_string()) {
            self.candidates.push(Candidate {
                plugin: Arc::clone(plugin),
                mode,
                phase,
            });
        }
    }
}
