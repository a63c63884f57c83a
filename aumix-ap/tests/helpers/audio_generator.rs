//! WAV fixture generation
//!
//! 16-bit PCM files holding a single constant sample value, so decoded
//! output can be checked without spectral analysis.

use hound::{WavSpec, WavWriter};
use std::io::Cursor;
use std::path::Path;

fn spec(sample_rate: u32, channels: u16) -> WavSpec {
    WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Write `frames` frames of `value` on every channel to `path`
pub fn write_constant_wav<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    channels: u16,
    frames: usize,
    value: i16,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, spec(sample_rate, channels))?;
    for _ in 0..frames * channels as usize {
        writer.write_sample(value)?;
    }
    writer.finalize()
}

/// Same as [`write_constant_wav`], into memory
pub fn constant_wav_bytes(sample_rate: u32, channels: u16, frames: usize, value: i16) -> Vec<u8> {
    let mut bytes = Vec::new();
    {
        let mut writer = WavWriter::new(Cursor::new(&mut bytes), spec(sample_rate, channels))
            .expect("WAV header should encode");
        for _ in 0..frames * channels as usize {
            writer.write_sample(value).expect("sample should encode");
        }
        writer.finalize().expect("WAV should finalize");
    }
    bytes
}
