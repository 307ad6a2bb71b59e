//! Decode session: one decoder run for one song
//!
//! The worker hands the locked control block to [`run`]; the session claims
//! the song, unlocks, opens and buffers the input, tries the candidate
//! plugins, and returns the control block locked with a terminal state
//! (`Stop` or `Error`) recorded.

use super::api::Decoder;
use super::control::{ControlState, DecodeCommand, DecodeState, DecoderControl};
use super::worker::DecoderWorker;
use crate::audio::{MusicBuffer, MusicPipe};
use crate::error::{Error, SessionError};
use crate::input::InputHandle;
use crate::plugins::{select, DecodeMode, SourceInfo};
use cadence_common::SongRef;
use std::path::Path;
use std::sync::{Arc, MutexGuard};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

type Guard<'a> = MutexGuard<'a, ControlState>;

enum Outcome {
    /// A plugin accepted the input and ran to completion
    Completed { plugin: String },

    /// A stop request ended the session before any plugin accepted
    Stopped,

    /// A plugin accepted the input and then failed
    Failed { plugin: String, error: Error },

    /// Every candidate declined
    NoPlugin,
}

struct Output {
    buffer: Arc<MusicBuffer>,
    pipe: Arc<MusicPipe>,
    start_ms: u64,
    end_ms: u64,
}

/// Run a session for the requested song
pub(crate) fn run<'a>(
    worker: &DecoderWorker,
    control: &'a Arc<DecoderControl>,
    mut state: Guard<'a>,
) -> Guard<'a> {
    let Some(song) = state.song.clone() else {
        return fail(
            state,
            SessionError::Resolve {
                uri: String::new(),
                reason: "no song requested".to_string(),
            },
        );
    };

    let span = info_span!("decode_session", id = %Uuid::new_v4(), uri = %song.uri());
    let _enter = span.enter();

    let uri = match worker.mapper.map(&song) {
        Ok(uri) => uri,
        Err(e) => {
            return fail(
                state,
                SessionError::Resolve {
                    uri: song.uri().to_string(),
                    reason: e.to_string(),
                },
            )
        }
    };

    let (Some(buffer), Some(pipe)) = (state.buffer.clone(), state.pipe.clone()) else {
        return fail(state, SessionError::NoOutput { uri });
    };
    let output = Output {
        buffer,
        pipe,
        start_ms: state.start_ms,
        end_ms: state.end_ms,
    };

    state.current_song = Some(Arc::clone(&song));
    state.state = DecodeState::Start;
    state.command = DecodeCommand::None;
    state.seekable = false;
    state.audio_format = None;
    state.total_time = None;
    control.signal();
    drop(state);
    control.notify_player();

    info!("Decoding {}", uri);
    let outcome = decode(worker, control, &song, &uri, output);

    let mut state = control.lock();
    match outcome {
        Ok(Outcome::Completed { plugin }) => {
            info!("Finished decoding {} with {}", uri, plugin);
            state.state = DecodeState::Stop;
        }
        Ok(Outcome::Stopped) => {
            info!("Decoding {} stopped", uri);
            state.state = DecodeState::Stop;
        }
        Ok(Outcome::Failed { plugin, error }) => {
            state = fail(
                state,
                SessionError::Decode {
                    uri,
                    plugin,
                    reason: error.to_string(),
                },
            );
        }
        Ok(Outcome::NoPlugin) => {
            state = fail(state, SessionError::NoPlugin { uri });
        }
        Err(error) => {
            state = fail(state, error);
        }
    }

    if state.command == DecodeCommand::Seek {
        // Session ended before the plugin could handle the seek
        state.seek_failed = true;
    }
    state
}

fn fail<'a>(mut state: Guard<'a>, error: SessionError) -> Guard<'a> {
    warn!("Decode session failed: {}", error);
    state.state = DecodeState::Error;
    state.error = Some(error);
    state
}

fn stop_requested(control: &DecoderControl) -> bool {
    control.lock().command == DecodeCommand::Stop
}

/// Buffer `input` until it is ready; `Ok(false)` if a stop arrived first
fn wait_ready(control: &DecoderControl, input: &InputHandle) -> crate::error::Result<bool> {
    loop {
        if stop_requested(control) {
            return Ok(false);
        }
        if input.is_ready() {
            return Ok(true);
        }
        input.buffer()?;
    }
}

fn decode(
    worker: &DecoderWorker,
    control: &Arc<DecoderControl>,
    song: &SongRef,
    uri: &str,
    output: Output,
) -> std::result::Result<Outcome, SessionError> {
    let stream = worker.opener.open(uri).map_err(|e| SessionError::Open {
        uri: uri.to_string(),
        reason: e.to_string(),
    })?;
    let input = InputHandle::new(stream);

    match wait_ready(control, &input) {
        Ok(true) => {}
        Ok(false) => {
            debug!("Stop requested while buffering");
            input.close();
            return Ok(Outcome::Stopped);
        }
        Err(e) => {
            input.close();
            return Err(SessionError::Buffer {
                uri: uri.to_string(),
                reason: e.to_string(),
            });
        }
    }
    if stop_requested(control) {
        input.close();
        return Ok(Outcome::Stopped);
    }

    let mime_type = input.mime_type();
    let source = SourceInfo {
        uri,
        mime_type: mime_type.as_deref(),
        is_local: song.is_file(),
    };
    let candidates = select(&worker.registry, &source, &worker.fallback_plugin);
    debug!("Candidate plugins: {:?}", candidates);

    let mut decoder = Decoder::new(
        Arc::clone(control),
        output.buffer,
        output.pipe,
        output.start_ms,
        output.end_ms,
        // Stream tags only extend the song's own tag for local files
        song.is_file().then(|| song.tag().cloned()).flatten(),
    );
    let mut input = Some(input);
    let mut outcome = Outcome::NoPlugin;

    for candidate in &candidates {
        if stop_requested(control) {
            outcome = Outcome::Stopped;
            break;
        }

        let result = match candidate.mode {
            DecodeMode::File => {
                if let Some(input) = input.take() {
                    input.close();
                }
                debug!("Trying {} (file decode)", candidate.name());
                candidate.plugin.file_decode(&mut decoder, Path::new(uri))
            }
            DecodeMode::Stream => {
                let Some(handle) = stream_input(worker, &mut input, uri) else {
                    continue;
                };
                debug!("Trying {} (stream decode)", candidate.name());
                candidate.plugin.stream_decode(&mut decoder, handle)
            }
        };

        let accepted = control.lock().state != DecodeState::Start;
        match (accepted, result) {
            (true, Ok(())) => {
                outcome = Outcome::Completed {
                    plugin: candidate.name().to_string(),
                };
                break;
            }
            (true, Err(error)) => {
                outcome = Outcome::Failed {
                    plugin: candidate.name().to_string(),
                    error,
                };
                break;
            }
            (false, Ok(())) => debug!("{} declined {}", candidate.name(), uri),
            (false, Err(Error::Unsupported(reason))) => {
                debug!("{} declined {}: {}", candidate.name(), uri, reason)
            }
            (false, Err(e)) => warn!("{} failed before accepting {}: {}", candidate.name(), uri, e),
        }
    }

    if matches!(outcome, Outcome::NoPlugin) && stop_requested(control) {
        outcome = Outcome::Stopped;
    }

    decoder.flush();
    if let Some(input) = input {
        input.close();
    }
    Ok(outcome)
}

/// Input for a stream-decode attempt, rewound to offset 0
///
/// Reopens the input if an earlier file-decode attempt closed it; `None`
/// skips the candidate.
fn stream_input(
    worker: &DecoderWorker,
    input: &mut Option<InputHandle>,
    uri: &str,
) -> Option<InputHandle> {
    if input.is_none() {
        let handle = match worker.opener.open(uri) {
            Ok(stream) => InputHandle::new(stream),
            Err(e) => {
                warn!("Cannot reopen {}: {}", uri, e);
                return None;
            }
        };
        if !handle.is_ready() {
            warn!("Reopened {} is not ready", uri);
            handle.close();
            return None;
        }
        *input = Some(handle);
    }

    let handle = input.as_ref()?.clone();
    if handle.offset() != 0 {
        if let Err(e) = handle.seek(0) {
            debug!("Cannot rewind {}: {}", uri, e);
        }
    }
    Some(handle)
}
