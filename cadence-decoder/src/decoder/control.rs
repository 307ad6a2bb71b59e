//! Shared decoder control block
//!
//! All cross-thread decoder state lives in [`ControlState`], guarded by one
//! mutex. A single condition variable carries every wakeup: the worker
//! waits on it for commands, controllers wait on it for commands to be
//! acknowledged, and the decoder waits on it for free chunks. Every change
//! to a waited-on field is followed by `notify_all`.
//!
//! Commands are handed over in one of two ways:
//! - synchronous: set `command`, notify, wait until the worker resets it to
//!   `None` (`start`, `seek`, `stop`)
//! - asynchronous: set `command`, notify, return (`quit`, which then joins
//!   the worker thread)

use crate::audio::{AudioFormat, MusicBuffer, MusicPipe};
use crate::error::{Error, Result, SessionError};
use cadence_common::{Song, SongRef};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Decoder state as observed by controllers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    /// Idle
    Stop,

    /// Session initializing: song claimed, no plugin has accepted yet
    Start,

    /// A plugin accepted the input and is producing chunks
    Decode,

    /// Last session ended abnormally; held until the next command
    Error,
}

impl DecodeState {
    /// True when no session is running
    pub fn is_idle(self) -> bool {
        match self {
            DecodeState::Stop | DecodeState::Error => true,
            DecodeState::Start | DecodeState::Decode => false,
        }
    }
}

/// Pending command from a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeCommand {
    None,
    Start,
    Stop,
    Seek,
}

/// Fields guarded by the control block lock
pub struct ControlState {
    pub(crate) state: DecodeState,
    pub(crate) command: DecodeCommand,
    pub(crate) quit: bool,

    /// Song requested by the last `start`
    pub(crate) song: Option<SongRef>,

    /// Song claimed by the running session
    pub(crate) current_song: Option<SongRef>,

    pub(crate) start_ms: u64,

    /// 0 plays to the end of the song
    pub(crate) end_ms: u64,

    pub(crate) seekable: bool,
    pub(crate) seek_target: Duration,
    pub(crate) seek_failed: bool,
    pub(crate) error: Option<SessionError>,

    pub(crate) audio_format: Option<AudioFormat>,
    pub(crate) total_time: Option<Duration>,

    pub(crate) replay_gain_db: f32,
    pub(crate) replay_gain_prev_db: f32,

    mixramp_start: Option<Arc<str>>,
    mixramp_end: Option<Arc<str>>,
    mixramp_prev_end: Option<Arc<str>>,

    pub(crate) buffer: Option<Arc<MusicBuffer>>,
    pub(crate) pipe: Option<Arc<MusicPipe>>,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            state: DecodeState::Stop,
            command: DecodeCommand::None,
            quit: false,
            song: None,
            current_song: None,
            start_ms: 0,
            end_ms: 0,
            seekable: false,
            seek_target: Duration::ZERO,
            seek_failed: false,
            error: None,
            audio_format: None,
            total_time: None,
            replay_gain_db: 0.0,
            replay_gain_prev_db: 0.0,
            mixramp_start: None,
            mixramp_end: None,
            mixramp_prev_end: None,
            buffer: None,
            pipe: None,
        }
    }
}

impl ControlState {
    pub fn state(&self) -> DecodeState {
        self.state
    }

    pub fn command(&self) -> DecodeCommand {
        self.command
    }

    pub fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    /// Song claimed by the running session (meaningless while idle)
    pub fn current_song(&self) -> Option<&SongRef> {
        self.current_song.as_ref()
    }

    pub fn is_seekable(&self) -> bool {
        self.seekable
    }

    pub fn audio_format(&self) -> Option<AudioFormat> {
        self.audio_format
    }

    pub fn total_time(&self) -> Option<Duration> {
        self.total_time
    }

    pub fn replay_gain_db(&self) -> f32 {
        self.replay_gain_db
    }

    pub fn replay_gain_prev_db(&self) -> f32 {
        self.replay_gain_prev_db
    }

    pub fn mixramp_start(&self) -> Option<&str> {
        self.mixramp_start.as_deref()
    }

    pub fn mixramp_end(&self) -> Option<&str> {
        self.mixramp_end.as_deref()
    }

    pub fn mixramp_prev_end(&self) -> Option<&str> {
        self.mixramp_prev_end.as_deref()
    }

    /// Replace the mix ramp start value, releasing the previous one
    pub fn set_mixramp_start(&mut self, value: Option<Arc<str>>) {
        self.mixramp_start = value;
    }

    /// Replace the mix ramp end value, releasing the previous one
    pub fn set_mixramp_end(&mut self, value: Option<Arc<str>>) {
        self.mixramp_end = value;
    }

    /// Replace the previous song's mix ramp end value
    pub fn set_mixramp_prev_end(&mut self, value: Option<Arc<str>>) {
        self.mixramp_prev_end = value;
    }

    /// Record a warning if the worker finds itself busy between commands
    pub(crate) fn check_idle(&self) {
        debug_assert!(
            self.state.is_idle(),
            "decoder worker busy between commands: {:?}",
            self.state
        );
        if !self.state.is_idle() {
            warn!("Decoder worker busy between commands: {:?}", self.state);
        }
    }

    /// Move per-song metadata of the last song into the "previous" slots
    ///
    /// Runs when a new song starts.
    pub(crate) fn cycle_song_metadata(&mut self) {
        self.replay_gain_prev_db = self.replay_gain_db;
        self.replay_gain_db = 0.0;

        let end = self.mixramp_end.take();
        self.set_mixramp_prev_end(end);
        self.set_mixramp_start(None);
    }
}

type PlayerSignal = Box<dyn Fn() + Send + Sync>;

/// Control block shared by the decoder worker and its controllers
///
/// Always held in an `Arc`; [`DecoderControl::quit`] joins the worker so
/// the block outlives every thread that uses it.
pub struct DecoderControl {
    state: Mutex<ControlState>,
    cond: Condvar,
    thread: Mutex<Option<JoinHandle<()>>>,

    /// Wakes the playback worker on state changes and new chunks
    player_signal: PlayerSignal,
}

impl Default for DecoderControl {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderControl {
    pub fn new() -> Self {
        Self::with_player_signal(|| {})
    }

    /// Control block that calls `signal` to wake the playback worker
    ///
    /// `signal` may run while the control block is locked, so it must not
    /// lock the control block itself.
    pub fn with_player_signal(signal: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            state: Mutex::new(ControlState::default()),
            cond: Condvar::new(),
            thread: Mutex::new(None),
            player_signal: Box::new(signal),
        }
    }

    /// Lock the control block
    pub fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for a wakeup, releasing the lock while blocked
    pub fn wait<'a>(&self, guard: MutexGuard<'a, ControlState>) -> MutexGuard<'a, ControlState> {
        self.cond.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    /// Wake every waiter
    pub fn signal(&self) {
        self.cond.notify_all();
    }

    /// Lock, wake every waiter, unlock
    ///
    /// Used by the playback worker after recycling chunks, so a decoder
    /// waiting for a free chunk cannot miss the wakeup.
    pub fn lock_signal(&self) {
        let _guard = self.lock();
        self.signal();
    }

    pub(crate) fn notify_player(&self) {
        (self.player_signal)();
    }

    fn synchronous_command_locked<'a>(
        &self,
        mut guard: MutexGuard<'a, ControlState>,
        command: DecodeCommand,
    ) -> MutexGuard<'a, ControlState> {
        guard.command = command;
        self.signal();
        while guard.command != DecodeCommand::None {
            guard = self.wait(guard);
        }
        guard
    }

    fn asynchronous_command_locked(&self, guard: &mut ControlState, command: DecodeCommand) {
        guard.command = command;
        self.signal();
    }

    pub(crate) fn set_thread(&self, handle: JoinHandle<()>) {
        *self.thread.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// True between a successful spawn and `quit`
    pub fn is_running(&self) -> bool {
        self.thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn state(&self) -> DecodeState {
        self.lock().state
    }

    /// Error that ended the last session, if the decoder is in `Error`
    pub fn error(&self) -> Option<SessionError> {
        let guard = self.lock();
        match guard.state {
            DecodeState::Error => guard.error.clone(),
            DecodeState::Stop | DecodeState::Start | DecodeState::Decode => None,
        }
    }

    /// True if a session is running for `song`
    pub fn is_current_song(&self, song: &SongRef) -> bool {
        let guard = self.lock();
        if guard.state.is_idle() {
            return false;
        }
        guard
            .current_song
            .as_ref()
            .is_some_and(|current| Song::same(current, song))
    }

    /// Start decoding `song` into `pipe`
    ///
    /// Blocks until the worker has claimed the song (state `Start`) or the
    /// session failed early. `end_ms == 0` plays to the end of the song.
    pub fn start(
        &self,
        song: SongRef,
        start_ms: u64,
        end_ms: u64,
        buffer: Arc<MusicBuffer>,
        pipe: Arc<MusicPipe>,
    ) -> Result<()> {
        if !pipe.is_empty() {
            return Err(Error::PipeNotEmpty);
        }
        if !self.is_running() {
            return Err(Error::NotRunning);
        }

        info!("Starting decoder for {}", song.uri());

        let mut guard = self.lock();
        guard.song = Some(song);
        guard.start_ms = start_ms;
        guard.end_ms = end_ms;
        guard.buffer = Some(buffer);
        guard.pipe = Some(pipe);
        guard.error = None;
        let _guard = self.synchronous_command_locked(guard, DecodeCommand::Start);
        Ok(())
    }

    /// Stop the running session, if any
    ///
    /// On return the state is `Stop` or `Error`.
    pub fn stop(&self) {
        if !self.is_running() {
            return;
        }

        let mut guard = self.lock();
        if guard.command != DecodeCommand::None {
            // Cancel the outstanding command first
            guard = self.synchronous_command_locked(guard, DecodeCommand::Stop);
        }
        if !guard.state.is_idle() {
            guard = self.synchronous_command_locked(guard, DecodeCommand::Stop);
        }
        debug!("Decoder stopped in state {:?}", guard.state);
    }

    /// Seek the running session to `target`
    ///
    /// Returns `Ok(false)` without sending a command when the decoder is
    /// idle or the stream cannot seek, and `Ok(false)` when the plugin
    /// reported a failed seek. Seeking before a plugin has accepted the
    /// input is an error.
    pub fn seek(&self, target: Duration) -> Result<bool> {
        let mut guard = self.lock();
        match guard.state {
            DecodeState::Stop | DecodeState::Error => return Ok(false),
            DecodeState::Start => {
                return Err(Error::InvalidState(
                    "cannot seek before the decoder is initialized".to_string(),
                ))
            }
            DecodeState::Decode => {}
        }
        if !guard.seekable {
            debug!("Ignoring seek: stream is not seekable");
            return Ok(false);
        }

        guard.seek_target = target;
        guard.seek_failed = false;
        let guard = self.synchronous_command_locked(guard, DecodeCommand::Seek);
        Ok(!guard.seek_failed)
    }

    /// Stop the worker thread and wait for it to exit
    pub fn quit(&self) -> Result<()> {
        let handle = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(Error::NotRunning)?;

        {
            let mut guard = self.lock();
            guard.quit = true;
            self.asynchronous_command_locked(&mut guard, DecodeCommand::Stop);
        }

        handle
            .join()
            .map_err(|_| Error::Internal("decoder thread panicked".to_string()))?;
        info!("Decoder thread exited");
        Ok(())
    }
}
