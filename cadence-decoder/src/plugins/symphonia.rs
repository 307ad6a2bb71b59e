//! Built-in codec plugins backed by symphonia
//!
//! Each [`SymphoniaPlugin`] covers one family of formats (suffixes, MIME
//! types and the codecs it accepts) and shares the same probe/decode loop.
//! A plugin declines an input whose probed codec it does not accept, so an
//! Ogg file with a FLAC stream is left to the next candidate.

use super::DecoderPlugin;
use crate::audio::{AudioFormat, ReplayGain};
use crate::decoder::{DecodeCommand, Decoder, DecoderReader};
use crate::error::{Error, Result};
use crate::input::InputHandle;
use cadence_common::{uri, Tag, TagKind};
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{self, CodecType, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey};
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};
use tracing::{debug, warn};

impl MediaSource for DecoderReader {
    fn is_seekable(&self) -> bool {
        self.input().is_seekable()
    }

    fn byte_len(&self) -> Option<u64> {
        self.input().size()
    }
}

/// Codec plugin for one format family
pub struct SymphoniaPlugin {
    name: &'static str,
    suffixes: &'static [&'static str],
    mime_types: &'static [&'static str],
    accepts: fn(CodecType) -> bool,
}

impl SymphoniaPlugin {
    pub fn mp3() -> Self {
        Self {
            name: "mp3",
            suffixes: &["mp3", "mp2"],
            mime_types: &["audio/mpeg", "audio/mp3", "audio/x-mpeg"],
            accepts: |codec| {
                matches!(
                    codec,
                    codecs::CODEC_TYPE_MP1 | codecs::CODEC_TYPE_MP2 | codecs::CODEC_TYPE_MP3
                )
            },
        }
    }

    pub fn flac() -> Self {
        Self {
            name: "flac",
            suffixes: &["flac"],
            mime_types: &["audio/flac", "audio/x-flac", "application/x-flac"],
            accepts: |codec| codec == codecs::CODEC_TYPE_FLAC,
        }
    }

    pub fn vorbis() -> Self {
        Self {
            name: "vorbis",
            suffixes: &["ogg", "oga"],
            mime_types: &["audio/ogg", "application/ogg", "audio/vorbis", "audio/x-vorbis+ogg"],
            accepts: |codec| codec == codecs::CODEC_TYPE_VORBIS,
        }
    }

    pub fn wav() -> Self {
        Self {
            name: "wav",
            suffixes: &["wav", "wave"],
            mime_types: &["audio/wav", "audio/x-wav", "audio/wave", "audio/vnd.wave"],
            accepts: |codec| {
                matches!(
                    codec,
                    codecs::CODEC_TYPE_PCM_S16LE
                        | codecs::CODEC_TYPE_PCM_S24LE
                        | codecs::CODEC_TYPE_PCM_S32LE
                        | codecs::CODEC_TYPE_PCM_U8
                        | codecs::CODEC_TYPE_PCM_F32LE
                        | codecs::CODEC_TYPE_PCM_F64LE
                        | codecs::CODEC_TYPE_PCM_S16BE
                        | codecs::CODEC_TYPE_PCM_ALAW
                        | codecs::CODEC_TYPE_PCM_MULAW
                )
            },
        }
    }

    pub fn aac() -> Self {
        Self {
            name: "aac",
            suffixes: &["aac", "m4a", "mp4"],
            mime_types: &["audio/aac", "audio/aacp", "audio/mp4", "audio/x-m4a"],
            accepts: |codec| codec == codecs::CODEC_TYPE_AAC,
        }
    }

    /// Every built-in plugin, in precedence order
    pub fn all() -> Vec<Self> {
        vec![
            Self::mp3(),
            Self::flac(),
            Self::vorbis(),
            Self::wav(),
            Self::aac(),
        ]
    }

    fn decode_source(
        &self,
        decoder: &mut Decoder,
        source: Box<dyn MediaSource>,
        hint: &Hint,
    ) -> Result<()> {
        let seekable = source.is_seekable();
        let mss = MediaSourceStream::new(source, Default::default());

        let format_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };
        let probed = symphonia::default::get_probe()
            .format(hint, mss, &format_opts, &MetadataOptions::default())
            .map_err(|e| Error::Unsupported(format!("{}: cannot probe input: {}", self.name, e)))?;
        let mut probed_metadata = probed.metadata;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Unsupported(format!("{}: no audio track", self.name)))?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        if !(self.accepts)(params.codec) {
            return Err(Error::Unsupported(format!(
                "{} does not handle codec {:?}",
                self.name, params.codec
            )));
        }

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| Error::Unsupported(format!("{}: sample rate not found", self.name)))?;
        let channels = params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| Error::Unsupported(format!("{}: channel count not found", self.name)))?;
        let audio_format = AudioFormat::new(sample_rate, channels);

        let total_time = match (params.n_frames, params.time_base) {
            (Some(frames), Some(time_base)) => Some(time_to_duration(time_base.calc_time(frames))),
            (Some(frames), None) => Some(audio_format.frames_to_duration(frames)),
            (None, _) => None,
        };

        let mut codec = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| Error::Unsupported(format!("{}: cannot create codec: {}", self.name, e)))?;

        decoder.initialized(audio_format, seekable, total_time)?;

        let mut tag = Tag::new().with_duration(total_time);
        let mut replay_gain = None;
        if let Some(metadata) = probed_metadata.get() {
            if let Some(revision) = metadata.current() {
                collect_metadata(revision, &mut tag, &mut replay_gain);
            }
        }
        {
            let metadata = format.metadata();
            if let Some(revision) = metadata.current() {
                collect_metadata(revision, &mut tag, &mut replay_gain);
            }
        }
        if replay_gain.is_some() {
            decoder.submit_replay_gain(replay_gain);
        }
        if !tag.items().is_empty() && decoder.submit_tag(tag) == DecodeCommand::Stop {
            return Ok(());
        }

        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        // Frames between the packet an accurate seek landed on and the target
        let mut skip_frames: u64 = 0;

        loop {
            match decoder.command() {
                DecodeCommand::Seek => {
                    let target = decoder.seek_target();
                    let seek_to = SeekTo::Time {
                        time: duration_to_time(target),
                        track_id: Some(track_id),
                    };
                    match format.seek(SeekMode::Accurate, seek_to) {
                        Ok(seeked) => {
                            skip_frames = seek_skip_frames(
                                seeked.required_ts.saturating_sub(seeked.actual_ts),
                                params.time_base,
                                sample_rate,
                            );
                            debug!(
                                "Seeked to {:?} (ts {}, skipping {} frames)",
                                target, seeked.actual_ts, skip_frames
                            );
                            codec.reset();
                            decoder.command_finished();
                        }
                        Err(e) => {
                            warn!("Seek to {:?} failed: {}", target, e);
                            decoder.seek_error();
                        }
                    }
                    continue;
                }
                DecodeCommand::Stop => break,
                DecodeCommand::None | DecodeCommand::Start => {}
            }

            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    debug!("Reached end of stream");
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    debug!("Stream parameters changed, ending decode");
                    break;
                }
                Err(e) => return Err(Error::Decode(format!("Error reading packet: {}", e))),
            };

            if packet.track_id() != track_id {
                continue;
            }
            let kbit_rate = packet_bit_rate(packet.buf().len(), packet.dur, sample_rate);

            let decoded = match codec.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Skipping undecodable packet: {}", e);
                    continue;
                }
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => return Err(Error::Decode(format!("Decode error: {}", e))),
            };
            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            let needed = decoded.capacity() * spec.channels.count();
            if sample_buf.as_ref().map_or(true, |buf| buf.capacity() < needed) {
                sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }
            let Some(buf) = sample_buf.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(decoded);

            let mut samples = buf.samples();
            if skip_frames > 0 {
                let frames = (samples.len() / spec.channels.count()) as u64;
                let skip = skip_frames.min(frames);
                skip_frames -= skip;
                samples = &samples[skip as usize * spec.channels.count()..];
                if samples.is_empty() {
                    continue;
                }
            }

            match decoder.submit_data(samples, kbit_rate) {
                DecodeCommand::Stop => break,
                DecodeCommand::None | DecodeCommand::Start | DecodeCommand::Seek => {}
            }
        }

        Ok(())
    }
}

impl DecoderPlugin for SymphoniaPlugin {
    fn name(&self) -> &str {
        self.name
    }

    fn suffixes(&self) -> &[&str] {
        self.suffixes
    }

    fn mime_types(&self) -> &[&str] {
        self.mime_types
    }

    fn supports_stream(&self) -> bool {
        true
    }

    fn supports_file(&self) -> bool {
        true
    }

    fn stream_decode(&self, decoder: &mut Decoder, input: InputHandle) -> Result<()> {
        let mut hint = Hint::new();
        let input_uri = input.uri();
        if let Some(suffix) = uri::suffix(&input_uri) {
            hint.with_extension(suffix);
        }
        if let Some(mime_type) = input.mime_type() {
            hint.mime_type(&mime_type);
        }

        let reader = decoder.reader(input);
        self.decode_source(decoder, Box::new(reader), &hint)
    }

    fn file_decode(&self, decoder: &mut Decoder, path: &Path) -> Result<()> {
        let file = File::open(path)
            .map_err(|e| Error::Input(format!("Failed to open {}: {}", path.display(), e)))?;

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(extension);
        }

        self.decode_source(decoder, Box::new(file), &hint)
    }
}

fn collect_metadata(
    revision: &MetadataRevision,
    tag: &mut Tag,
    replay_gain: &mut Option<ReplayGain>,
) {
    for item in revision.tags() {
        let Some(key) = item.std_key else {
            continue;
        };
        let value = item.value.to_string();

        match key {
            StandardTagKey::ReplayGainTrackGain => {
                if let Some(gain_db) = parse_leading_number(&value) {
                    replay_gain.get_or_insert(ReplayGain { gain_db, peak: 1.0 }).gain_db = gain_db;
                }
            }
            StandardTagKey::ReplayGainTrackPeak => {
                if let Some(peak) = parse_leading_number(&value) {
                    replay_gain.get_or_insert(ReplayGain { gain_db: 0.0, peak }).peak = peak;
                }
            }
            other => {
                if let Some(kind) = tag_kind(other) {
                    tag.add(kind, value);
                }
            }
        }
    }
}

fn tag_kind(key: StandardTagKey) -> Option<TagKind> {
    match key {
        StandardTagKey::Artist => Some(TagKind::Artist),
        StandardTagKey::Album => Some(TagKind::Album),
        StandardTagKey::AlbumArtist => Some(TagKind::AlbumArtist),
        StandardTagKey::TrackTitle => Some(TagKind::Title),
        StandardTagKey::TrackNumber => Some(TagKind::Track),
        StandardTagKey::Genre => Some(TagKind::Genre),
        StandardTagKey::Date => Some(TagKind::Date),
        StandardTagKey::Composer => Some(TagKind::Composer),
        StandardTagKey::Comment => Some(TagKind::Comment),
        _ => None,
    }
}

/// "-6.52 dB" -> -6.52
fn parse_leading_number(value: &str) -> Option<f32> {
    value.split_whitespace().next()?.parse().ok()
}

/// Bit rate in kbit/s from a packet's size and duration in frames
fn packet_bit_rate(bytes: usize, frames: u64, sample_rate: u32) -> u16 {
    if frames == 0 {
        return 0;
    }
    let kbit = bytes as u64 * 8 * sample_rate as u64 / frames / 1000;
    u16::try_from(kbit).unwrap_or(u16::MAX)
}

/// Convert a timestamp delta in the track's time base to frames
fn seek_skip_frames(delta_ts: u64, time_base: Option<TimeBase>, sample_rate: u32) -> u64 {
    match time_base {
        Some(time_base) => {
            let time = time_base.calc_time(delta_ts);
            let frames = time.seconds as f64 * sample_rate as f64 + time.frac * sample_rate as f64;
            frames.round() as u64
        }
        None => delta_ts,
    }
}

fn time_to_duration(time: Time) -> Duration {
    Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac.clamp(0.0, 1.0))
}

fn duration_to_time(duration: Duration) -> Time {
    Time::new(duration.as_secs(), f64::from(duration.subsec_nanos()) / 1e9)
}
