//! Scripted collaborators for decoder session tests
//!
//! - `ScriptedOpener` hands out in-memory streams that become ready after a
//!   number of buffer calls (or never), and counts opens and closes
//! - `ScriptedPlugin` declines, accepts, fails, decodes until stopped or
//!   reads its input through the decoder, recording every invocation in a
//!   shared call log

use cadence_decoder::audio::AudioFormat;
use cadence_decoder::error::{Error, Result};
use cadence_decoder::input::{InputHandle, InputOpener, InputStream};
use cadence_decoder::plugins::DecoderPlugin;
use cadence_common::Tag;
use cadence_decoder::{DecodeCommand, Decoder};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Shape of the streams a `ScriptedOpener` hands out
#[derive(Clone, Default)]
pub struct StreamSpec {
    pub mime_type: Option<String>,
    pub data: Vec<u8>,

    /// Buffer calls before the stream is ready; `None` never becomes ready
    pub ready_after: Option<usize>,

    /// Byte offset the stream stops delivering data at (without reaching EOF)
    pub stall_at: Option<usize>,

    pub seekable: bool,
    pub fail_open: bool,
    pub fail_buffer: bool,
}

impl StreamSpec {
    pub fn ready() -> Self {
        Self {
            ready_after: Some(0),
            seekable: true,
            ..Self::default()
        }
    }

    pub fn never_ready() -> Self {
        Self {
            ready_after: None,
            ..Self::default()
        }
    }

    pub fn with_mime_type(mut self, mime_type: &str) -> Self {
        self.mime_type = Some(mime_type.to_string());
        self
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    pub fn stalling_at(mut self, offset: usize) -> Self {
        self.stall_at = Some(offset);
        self
    }
}

struct ScriptedStream {
    uri: String,
    spec: StreamSpec,
    offset: usize,
    buffer_calls: usize,
    closed: bool,
    close_count: Arc<AtomicUsize>,
    buffer_count: Arc<AtomicUsize>,
}

impl InputStream for ScriptedStream {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn is_ready(&self) -> bool {
        self.spec
            .ready_after
            .is_some_and(|calls| self.buffer_calls >= calls)
    }

    fn buffer(&mut self) -> Result<bool> {
        thread::sleep(Duration::from_millis(2));
        self.buffer_calls += 1;
        self.buffer_count.fetch_add(1, Ordering::SeqCst);
        if self.spec.fail_buffer {
            return Err(Error::Input("connection reset".to_string()));
        }
        Ok(self.is_ready())
    }

    fn mime_type(&self) -> Option<&str> {
        self.spec.mime_type.as_deref()
    }

    fn is_seekable(&self) -> bool {
        self.spec.seekable
    }

    fn size(&self) -> Option<u64> {
        Some(self.spec.data.len() as u64)
    }

    fn offset(&self) -> u64 {
        self.offset as u64
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        if !self.spec.seekable && offset != self.offset as u64 {
            return Err(Error::Input("not seekable".to_string()));
        }
        self.offset = (offset as usize).min(self.spec.data.len());
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.closed {
            return Ok(0);
        }
        let limit = self
            .spec
            .stall_at
            .map_or(self.spec.data.len(), |stall| stall.min(self.spec.data.len()));
        let rest = &self.spec.data[self.offset.min(limit)..limit];
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.offset += n;
        Ok(n)
    }

    fn is_eof(&self) -> bool {
        self.closed || self.offset >= self.spec.data.len()
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.close_count.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Opener producing `ScriptedStream`s for any URI
pub struct ScriptedOpener {
    spec: StreamSpec,
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
    pub buffered: Arc<AtomicUsize>,
}

impl ScriptedOpener {
    pub fn new(spec: StreamSpec) -> Arc<Self> {
        Arc::new(Self {
            spec,
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
            buffered: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Buffer calls across every stream handed out
    pub fn buffered(&self) -> usize {
        self.buffered.load(Ordering::SeqCst)
    }
}

impl InputOpener for ScriptedOpener {
    fn open(&self, uri: &str) -> Result<Box<dyn InputStream>> {
        if self.spec.fail_open {
            return Err(Error::Input(format!("{}: host unreachable", uri)));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedStream {
            uri: uri.to_string(),
            spec: self.spec.clone(),
            offset: 0,
            buffer_calls: 0,
            closed: false,
            close_count: Arc::clone(&self.closed),
            buffer_count: Arc::clone(&self.buffered),
        }))
    }
}

/// Invocations recorded as `"<plugin>:<stream|file>"`
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[derive(Clone, Copy)]
pub enum Behavior {
    /// Return without initializing
    Decline,

    /// Return an error without initializing
    DeclineWithError,

    /// Initialize and submit `frames` stereo frames
    Accept { frames: usize },

    /// Initialize, then fail
    AcceptThenFail,

    /// Initialize and submit silence until stopped
    AcceptUntilStop,

    /// Initialize, then read the input through the decoder until end of
    /// stream or stop, finishing every seek it is handed
    ReadInput,
}

/// Sample rate of the format scripted plugins initialize with
pub const SCRIPTED_RATE: u32 = 1000;

pub struct ScriptedPlugin {
    name: &'static str,
    suffixes: Vec<&'static str>,
    mime_types: Vec<&'static str>,
    stream: bool,
    file: bool,
    behavior: Behavior,
    seekable: bool,
    seek_fails: bool,
    replay_gain_db: Option<f32>,
    mixramp_end: Option<&'static str>,
    stream_tag: Option<Tag>,
    log: CallLog,
    stopped: Arc<AtomicBool>,
    bytes_read: Arc<AtomicUsize>,
    seeks: Arc<AtomicUsize>,
}

impl ScriptedPlugin {
    pub fn new(name: &'static str, behavior: Behavior, log: &CallLog) -> Self {
        Self {
            name,
            suffixes: Vec::new(),
            mime_types: Vec::new(),
            stream: true,
            file: false,
            behavior,
            seekable: true,
            seek_fails: false,
            replay_gain_db: None,
            mixramp_end: None,
            stream_tag: None,
            log: Arc::clone(log),
            stopped: Arc::new(AtomicBool::new(false)),
            bytes_read: Arc::new(AtomicUsize::new(0)),
            seeks: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_suffixes(mut self, suffixes: &[&'static str]) -> Self {
        self.suffixes = suffixes.to_vec();
        self
    }

    pub fn with_mime_types(mut self, mime_types: &[&'static str]) -> Self {
        self.mime_types = mime_types.to_vec();
        self
    }

    /// Set which decode modes the plugin supports
    pub fn modes(mut self, stream: bool, file: bool) -> Self {
        self.stream = stream;
        self.file = file;
        self
    }

    pub fn unseekable(mut self) -> Self {
        self.seekable = false;
        self
    }

    pub fn failing_seeks(mut self) -> Self {
        self.seek_fails = true;
        self
    }

    pub fn metadata(mut self, replay_gain_db: f32, mixramp_end: &'static str) -> Self {
        self.replay_gain_db = Some(replay_gain_db);
        self.mixramp_end = Some(mixramp_end);
        self
    }

    /// Tag submitted right after initializing
    pub fn with_stream_tag(mut self, tag: Tag) -> Self {
        self.stream_tag = Some(tag);
        self
    }

    /// Flag raised when the plugin observed a stop request
    pub fn stopped_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stopped)
    }

    /// Bytes read through `Decoder::read`
    pub fn bytes_read_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.bytes_read)
    }

    /// Seeks finished while reading
    pub fn seek_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.seeks)
    }

    pub fn into_arc(self) -> Arc<dyn DecoderPlugin> {
        Arc::new(self)
    }

    fn run(&self, decoder: &mut Decoder, mode: &str, input: Option<InputHandle>) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.name, mode));

        let format = AudioFormat::new(SCRIPTED_RATE, 2);
        match self.behavior {
            Behavior::Decline => Ok(()),
            Behavior::DeclineWithError => {
                Err(Error::Decode(format!("{} does not recognize the input", self.name)))
            }
            Behavior::Accept { frames } => {
                decoder.initialized(format, self.seekable, None)?;
                if let Some(tag) = &self.stream_tag {
                    decoder.submit_tag(tag.clone());
                }
                if let Some(gain_db) = self.replay_gain_db {
                    decoder.submit_replay_gain(Some(cadence_decoder::audio::ReplayGain {
                        gain_db,
                        peak: 1.0,
                    }));
                }
                if self.mixramp_end.is_some() {
                    decoder.submit_mixramp(None, self.mixramp_end);
                }

                let samples = vec![0.25f32; frames * 2];
                for block in samples.chunks(20) {
                    if decoder.submit_data(block, 32) == DecodeCommand::Stop {
                        self.stopped.store(true, Ordering::SeqCst);
                        break;
                    }
                }
                Ok(())
            }
            Behavior::AcceptThenFail => {
                decoder.initialized(format, self.seekable, None)?;
                Err(Error::Decode("corrupt frame header".to_string()))
            }
            Behavior::AcceptUntilStop => {
                decoder.initialized(format, self.seekable, None)?;
                let block = [0.0f32; 20];
                loop {
                    match decoder.submit_data(&block, 32) {
                        DecodeCommand::Stop => {
                            self.stopped.store(true, Ordering::SeqCst);
                            return Ok(());
                        }
                        DecodeCommand::Seek => {
                            if self.seek_fails {
                                decoder.seek_error();
                            } else {
                                decoder.command_finished();
                            }
                        }
                        DecodeCommand::None | DecodeCommand::Start => {
                            thread::sleep(Duration::from_millis(1));
                        }
                    }
                }
            }
            Behavior::ReadInput => {
                let Some(input) = input else {
                    return Err(Error::Unsupported(format!("{} reads streams only", self.name)));
                };
                decoder.initialized(format, self.seekable, None)?;

                let mut buf = [0u8; 64];
                loop {
                    let n = decoder.read(&input, &mut buf)?;
                    if n > 0 {
                        self.bytes_read.fetch_add(n, Ordering::SeqCst);
                        continue;
                    }
                    match decoder.command() {
                        DecodeCommand::Seek => {
                            self.seeks.fetch_add(1, Ordering::SeqCst);
                            decoder.command_finished();
                        }
                        DecodeCommand::Stop => {
                            self.stopped.store(true, Ordering::SeqCst);
                            return Ok(());
                        }
                        DecodeCommand::None | DecodeCommand::Start => return Ok(()),
                    }
                }
            }
        }
    }
}

impl DecoderPlugin for ScriptedPlugin {
    fn name(&self) -> &str {
        self.name
    }

    fn suffixes(&self) -> &[&str] {
        &self.suffixes
    }

    fn mime_types(&self) -> &[&str] {
        &self.mime_types
    }

    fn supports_stream(&self) -> bool {
        self.stream
    }

    fn supports_file(&self) -> bool {
        self.file
    }

    fn stream_decode(&self, decoder: &mut Decoder, input: InputHandle) -> Result<()> {
        assert_eq!(input.offset(), 0, "stream must be rewound before decoding");
        self.run(decoder, "stream", Some(input))
    }

    fn file_decode(&self, decoder: &mut Decoder, _path: &Path) -> Result<()> {
        self.run(decoder, "file", None)
    }
}
