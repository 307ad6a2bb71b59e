//! WAV test file generation
//!
//! Deterministic 16-bit sine waves with known frame counts, written to disk
//! or to memory (for scripted remote streams).

use hound::{WavSpec, WavWriter};
use std::f32::consts::PI;
use std::io::{Cursor, Seek, Write};
use std::path::Path;

/// Standard test sample rate (44.1 kHz)
pub const TEST_SAMPLE_RATE: u32 = 44100;

/// Frames in `duration_ms` at the test sample rate
pub fn frames_for(duration_ms: u64) -> u64 {
    TEST_SAMPLE_RATE as u64 * duration_ms / 1000
}

const FREQUENCY_HZ: f32 = 440.0;

fn sine_value(frame_idx: u64) -> i16 {
    let amplitude = 0.5 * i16::MAX as f32;
    let t = frame_idx as f32 / TEST_SAMPLE_RATE as f32;
    ((2.0 * PI * FREQUENCY_HZ * t).sin() * amplitude) as i16
}

/// Sample of the generated sine at `frame_idx`, as a decoder reports it
pub fn sine_sample(frame_idx: u64) -> f32 {
    sine_value(frame_idx) as f32 / 32768.0
}

fn write_sine<W: Write + Seek>(
    writer: W,
    channels: u16,
    duration_ms: u64,
) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate: TEST_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = WavWriter::new(writer, spec)?;

    for frame_idx in 0..frames_for(duration_ms) {
        let sample = sine_value(frame_idx);
        for _ in 0..channels {
            writer.write_sample(sample)?;
        }
    }

    writer.finalize()
}

/// Write a 440 Hz sine WAV file with `channels` channels
pub fn generate_sine_wav<P: AsRef<Path>>(
    path: P,
    channels: u16,
    duration_ms: u64,
) -> Result<(), hound::Error> {
    let file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_sine(file, channels, duration_ms)
}

/// Stereo 440 Hz sine WAV as bytes
pub fn sine_wav_bytes(duration_ms: u64) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    write_sine(&mut cursor, 2, duration_ms).expect("encode WAV in memory");
    cursor.into_inner()
}
