//! Decoder API handed to codec plugins
//!
//! A plugin drives one decode run through [`Decoder`]:
//! 1. `initialized()` once the format is known (this accepts the input)
//! 2. `submit_data()` for every block of decoded samples
//! 3. `command()` / `seek_target()` / `command_finished()` / `seek_error()`
//!    to react to seek and stop requests
//!
//! Samples are packed into chunks from the shared pool and pushed to the
//! pipe in decode order. When the pool is exhausted `submit_data` waits on
//! the control block until the playback worker recycles a chunk or a
//! command arrives.

use super::control::{ControlState, DecodeCommand, DecodeState, DecoderControl};
use super::reader::DecoderReader;
use crate::audio::{AudioFormat, MusicBuffer, MusicChunk, MusicPipe, ReplayGain};
use crate::error::{Error, Result};
use crate::input::InputHandle;
use cadence_common::Tag;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

pub struct Decoder {
    control: Arc<DecoderControl>,
    buffer: Arc<MusicBuffer>,
    pipe: Arc<MusicPipe>,

    /// Song position playback starts at
    start: Duration,

    /// Song position decoding stops at
    end: Option<Duration>,

    format: Option<AudioFormat>,

    /// Chunk being filled
    chunk: Option<MusicChunk>,

    /// Position of the first frame submitted after the last reset
    timestamp: Duration,

    /// Frames submitted since `timestamp`
    frames: u64,

    bit_rate: u16,

    /// Seek to `start` requested, not yet reported to the plugin
    initial_seek_pending: bool,

    /// Seek to `start` reported to the plugin, not yet finished
    initial_seek_running: bool,

    /// Tag known before decoding (from the song database)
    song_tag: Option<Tag>,

    /// Tag to attach to the next chunk
    pending_tag: Option<Tag>,

    replay_gain: Option<ReplayGain>,
}

impl Decoder {
    pub(crate) fn new(
        control: Arc<DecoderControl>,
        buffer: Arc<MusicBuffer>,
        pipe: Arc<MusicPipe>,
        start_ms: u64,
        end_ms: u64,
        song_tag: Option<Tag>,
    ) -> Self {
        Self {
            control,
            buffer,
            pipe,
            start: Duration::from_millis(start_ms),
            end: (end_ms > 0).then(|| Duration::from_millis(end_ms)),
            format: None,
            chunk: None,
            timestamp: Duration::ZERO,
            frames: 0,
            bit_rate: 0,
            initial_seek_pending: start_ms > 0,
            initial_seek_running: false,
            song_tag,
            pending_tag: None,
            replay_gain: None,
        }
    }

    /// Accept the input and publish its format
    ///
    /// Moves the decoder from `Start` to `Decode`. A plugin that returns
    /// without calling this has declined the input.
    pub fn initialized(
        &mut self,
        format: AudioFormat,
        seekable: bool,
        total_time: Option<Duration>,
    ) -> Result<()> {
        if !format.is_valid() {
            return Err(Error::Decode(format!("Invalid audio format {}", format)));
        }
        self.format = Some(format);

        {
            let mut state = self.control.lock();
            debug_assert_eq!(state.state, DecodeState::Start);
            state.audio_format = Some(format);
            state.seekable = seekable;
            state.total_time = total_time;
            state.state = DecodeState::Decode;
            self.control.signal();
        }
        self.control.notify_player();

        debug!(
            "Decoder initialized: format={}, seekable={}, duration={:?}",
            format, seekable, total_time
        );
        Ok(())
    }

    pub fn audio_format(&self) -> Option<AudioFormat> {
        self.format
    }

    /// Command the plugin should act on
    ///
    /// A non-zero start position is reported as a `Seek` to that position
    /// once the plugin has declared the stream seekable.
    pub fn command(&mut self) -> DecodeCommand {
        let control = Arc::clone(&self.control);
        let state = control.lock();
        self.virtual_command(&state)
    }

    fn virtual_command(&mut self, state: &ControlState) -> DecodeCommand {
        if self.initial_seek_pending && self.format.is_some() {
            if !state.seekable {
                warn!("Cannot start at {:?}: stream is not seekable", self.start);
                self.initial_seek_pending = false;
            } else if state.command == DecodeCommand::None {
                self.initial_seek_pending = false;
                self.initial_seek_running = true;
            }
        }

        if self.initial_seek_running {
            return DecodeCommand::Seek;
        }
        state.command
    }

    /// Position the current `Seek` command asks for
    pub fn seek_target(&self) -> Duration {
        if self.initial_seek_running {
            return self.start;
        }
        self.control.lock().seek_target
    }

    /// Report that the current `Seek` command completed
    ///
    /// Chunks decoded before the seek are dropped and timestamps restart at
    /// the seek target.
    pub fn command_finished(&mut self) {
        if self.initial_seek_running {
            self.initial_seek_running = false;
            self.discard_chunk();
            self.reset_timestamp(self.start);
            return;
        }

        let control = Arc::clone(&self.control);
        let mut state = control.lock();
        match state.command {
            DecodeCommand::Seek => {
                self.discard_chunk();
                self.pipe.clear(&self.buffer);
                self.reset_timestamp(state.seek_target);
                state.command = DecodeCommand::None;
                control.signal();
            }
            DecodeCommand::None | DecodeCommand::Start | DecodeCommand::Stop => {
                warn!("command_finished() without a pending seek ({:?})", state.command);
            }
        }
    }

    /// Report that the current `Seek` command failed
    pub fn seek_error(&mut self) {
        if self.initial_seek_running {
            warn!("Initial seek to {:?} failed", self.start);
            self.initial_seek_running = false;
            return;
        }

        let mut state = self.control.lock();
        if state.command == DecodeCommand::Seek {
            state.seek_failed = true;
            state.command = DecodeCommand::None;
            self.control.signal();
        }
    }

    /// Read from `input`, buffering while no data is available
    ///
    /// Returns 0 at end of stream and as soon as a `Stop` or `Seek` command
    /// is pending.
    pub fn read(&mut self, input: &InputHandle, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            match self.command() {
                DecodeCommand::Stop | DecodeCommand::Seek => return Ok(0),
                DecodeCommand::None | DecodeCommand::Start => {}
            }

            let n = input.read(buf)?;
            if n > 0 || input.is_eof() {
                return Ok(n);
            }
            input.buffer()?;
        }
    }

    /// `Read + Seek` view of `input` for codec libraries
    pub fn reader(&self, input: InputHandle) -> DecoderReader {
        DecoderReader::new(Arc::clone(&self.control), input)
    }

    /// Submit interleaved samples in the initialized format
    ///
    /// Returns the command the plugin must handle next: `None` to keep
    /// decoding, `Seek`, or `Stop` (also returned once the end position is
    /// reached).
    pub fn submit_data(&mut self, samples: &[f32], kbit_rate: u16) -> DecodeCommand {
        match self.command() {
            command @ (DecodeCommand::Stop | DecodeCommand::Seek) => return command,
            DecodeCommand::None | DecodeCommand::Start => {}
        }

        let Some(format) = self.format else {
            error!("Plugin submitted data before initializing the decoder");
            return DecodeCommand::Stop;
        };
        let channels = format.channels as usize;
        let capacity = (self.buffer.chunk_samples() / channels).max(1) * channels;
        self.bit_rate = kbit_rate;

        let mut rest = samples;
        while !rest.is_empty() {
            let mut take = rest.len();
            if let Some(frames_left) = self.frames_until_end(format) {
                if frames_left == 0 {
                    self.flush();
                    return DecodeCommand::Stop;
                }
                let samples_left = usize::try_from(frames_left)
                    .unwrap_or(usize::MAX)
                    .saturating_mul(channels);
                take = take.min(samples_left);
            }

            let chunk = match self.current_chunk() {
                Ok(chunk) => chunk,
                Err(command) => return command,
            };
            chunk.bit_rate = kbit_rate;
            let take = take.min(capacity.saturating_sub(chunk.samples.len()));
            chunk.samples.extend_from_slice(&rest[..take]);
            let full = chunk.samples.len() >= capacity;

            rest = &rest[take..];
            self.frames += (take / channels) as u64;

            if full {
                self.flush();
            }
        }

        if self.frames_until_end(format) == Some(0) {
            debug!("Reached end position {:?}", self.end);
            self.flush();
            return DecodeCommand::Stop;
        }
        DecodeCommand::None
    }

    /// Set the song position of the next submitted frame
    pub fn submit_timestamp(&mut self, time: Duration) {
        self.flush();
        self.reset_timestamp(time);
    }

    /// Submit a tag found in the stream
    ///
    /// The tag, merged over the song's own tag, is attached to the next
    /// chunk.
    pub fn submit_tag(&mut self, tag: Tag) -> DecodeCommand {
        self.flush();

        let merged = match &self.song_tag {
            Some(song_tag) => song_tag.merge(&tag),
            None => tag,
        };
        self.pending_tag = Some(merged);

        if self.format.is_some() {
            if let Err(command) = self.current_chunk() {
                return command;
            }
        }
        self.command()
    }

    /// Submit replay gain information for the rest of the song
    pub fn submit_replay_gain(&mut self, replay_gain: Option<ReplayGain>) {
        self.replay_gain = replay_gain;
        if let Some(chunk) = self.chunk.as_mut() {
            if chunk.samples.is_empty() {
                chunk.replay_gain = replay_gain;
            }
        }

        self.control.lock().replay_gain_db = replay_gain.map_or(0.0, |gain| gain.gain_db);
    }

    /// Submit mix ramp information for the current song
    pub fn submit_mixramp(&mut self, start: Option<&str>, end: Option<&str>) {
        let mut state = self.control.lock();
        state.set_mixramp_start(start.map(Arc::from));
        state.set_mixramp_end(end.map(Arc::from));
    }

    /// Push the chunk being filled, even if it is not full
    pub fn flush(&mut self) {
        let Some(chunk) = self.chunk.take() else {
            return;
        };
        if chunk.is_empty() {
            self.buffer.recycle(chunk);
            return;
        }

        trace!("Pushing chunk at {:?} ({} frames)", chunk.time, chunk.frames());
        self.pipe.push(chunk);
        self.control.notify_player();
    }

    fn position(&self) -> Duration {
        let decoded = self
            .format
            .map_or(Duration::ZERO, |format| format.frames_to_duration(self.frames));
        self.timestamp + decoded
    }

    fn frames_until_end(&self, format: AudioFormat) -> Option<u64> {
        let end = self.end?;
        let remaining = end.saturating_sub(self.position());
        let frames = remaining.as_nanos() * format.sample_rate as u128 / 1_000_000_000;
        Some(u64::try_from(frames).unwrap_or(u64::MAX))
    }

    fn reset_timestamp(&mut self, time: Duration) {
        self.timestamp = time;
        self.frames = 0;
    }

    fn discard_chunk(&mut self) {
        if let Some(chunk) = self.chunk.take() {
            self.buffer.recycle(chunk);
        }
    }

    fn current_chunk(&mut self) -> std::result::Result<&mut MusicChunk, DecodeCommand> {
        if self.chunk.is_none() {
            let chunk = self.allocate_chunk()?;
            self.chunk = Some(chunk);
        }
        self.chunk.as_mut().ok_or(DecodeCommand::Stop)
    }

    /// Take a chunk from the pool, waiting while it is exhausted
    ///
    /// A pending `Stop` or `Seek` interrupts the wait.
    fn allocate_chunk(&mut self) -> std::result::Result<MusicChunk, DecodeCommand> {
        let control = Arc::clone(&self.control);
        loop {
            if let Some(mut chunk) = self.buffer.allocate() {
                chunk.format = self.format.unwrap_or(AudioFormat::new(0, 0));
                chunk.time = self.position();
                chunk.bit_rate = self.bit_rate;
                chunk.tag = self.pending_tag.take();
                chunk.replay_gain = self.replay_gain;
                return Ok(chunk);
            }

            let state = control.lock();
            match self.virtual_command(&state) {
                command @ (DecodeCommand::Stop | DecodeCommand::Seek) => return Err(command),
                DecodeCommand::None | DecodeCommand::Start => {}
            }

            // The playback worker recycles before taking the lock to signal,
            // so re-checking here cannot miss its wakeup.
            if self.buffer.available() == 0 {
                trace!("Chunk pool exhausted, waiting");
                drop(control.wait(state));
            }
        }
    }
}

impl Drop for Decoder {
    fn drop(&mut self) {
        self.discard_chunk();
    }
}
