//! Core audio data types

use cadence_common::Tag;
use std::time::Duration;

/// Sample rate and channel layout of decoded PCM
///
/// Samples are always f32 (-1.0 to 1.0), interleaved: [L, R, L, R, ...]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Frames per second
    pub sample_rate: u32,

    /// Samples per frame
    pub channels: u16,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// A format the pipeline can carry (non-zero rate and channel count)
    pub fn is_valid(&self) -> bool {
        self.sample_rate > 0 && self.channels > 0
    }

    /// Play time of `frames` frames in this format
    pub fn frames_to_duration(&self, frames: u64) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let nanos = frames as u128 * 1_000_000_000 / self.sample_rate as u128;
        Duration::from_nanos(nanos as u64)
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}Hz/{}ch", self.sample_rate, self.channels)
    }
}

/// Track replay gain as reported by the codec
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayGain {
    /// Gain adjustment in dB
    pub gain_db: f32,

    /// Peak amplitude (1.0 = full scale)
    pub peak: f32,
}

/// One chunk of decoded audio
///
/// Allocated from a [`super::MusicBuffer`], filled by the decoder, pushed to
/// a [`super::MusicPipe`], and recycled by the playback worker.
#[derive(Debug, Clone)]
pub struct MusicChunk {
    /// Interleaved samples
    pub samples: Vec<f32>,

    /// Format of `samples`
    pub format: AudioFormat,

    /// Song position of the first frame in this chunk
    pub time: Duration,

    /// Codec bit rate in kbit/s (0 = unknown)
    pub bit_rate: u16,

    /// Tag that becomes effective at the start of this chunk
    pub tag: Option<Tag>,

    /// Replay gain in effect for this chunk
    pub replay_gain: Option<ReplayGain>,
}

impl MusicChunk {
    pub(crate) fn with_storage(samples: Vec<f32>) -> Self {
        Self {
            samples,
            format: AudioFormat::new(0, 0),
            time: Duration::ZERO,
            bit_rate: 0,
            tag: None,
            replay_gain: None,
        }
    }

    /// Number of whole frames in this chunk
    pub fn frames(&self) -> usize {
        if self.format.channels == 0 {
            0
        } else {
            self.samples.len() / self.format.channels as usize
        }
    }

    /// True if the chunk carries neither samples nor a tag
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty() && self.tag.is_none()
    }

    /// Play time of the samples in this chunk
    pub fn duration(&self) -> Duration {
        self.format.frames_to_duration(self.frames() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_to_duration() {
        let format = AudioFormat::new(44100, 2);
        assert_eq!(format.frames_to_duration(44100), Duration::from_secs(1));
        assert_eq!(format.frames_to_duration(22050), Duration::from_millis(500));
        assert_eq!(AudioFormat::new(0, 2).frames_to_duration(100), Duration::ZERO);
    }

    #[test]
    fn test_chunk_frames_and_emptiness() {
        let mut chunk = MusicChunk::with_storage(Vec::new());
        assert!(chunk.is_empty());
        assert_eq!(chunk.frames(), 0);

        chunk.format = AudioFormat::new(48000, 2);
        chunk.samples.extend_from_slice(&[0.0; 960]);
        assert_eq!(chunk.frames(), 480);
        assert_eq!(chunk.duration(), Duration::from_millis(10));

        let tag_only = MusicChunk {
            tag: Some(Tag::new()),
            ..MusicChunk::with_storage(Vec::new())
        };
        assert!(!tag_only.is_empty());
    }
}
