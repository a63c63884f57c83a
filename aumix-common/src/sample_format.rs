//! Device sample representations and float → device sample conversion
//!
//! The mixer works on canonical interleaved `f32` samples in roughly
//! `[-1.0, 1.0]`. Output devices want one of a handful of integer or float
//! encodings; a [`SampleConverter`] is selected once, when the device format
//! is negotiated, and then applied to every output sample.
//!
//! Conversion rules:
//! - Input is clamped to `[-1.0, 1.0]` (NaN becomes silence)
//! - Integer scaling is asymmetric so -1.0, 0.0 and 1.0 hit the exact
//!   minimum, zero and maximum codes of the representation
//! - Rounding is half away from zero
//! - Unsigned formats are the signed value offset by half the range

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Converts one canonical float sample into device bytes.
///
/// The output slice is exactly [`SampleFormat::bytes_per_sample`] long.
pub type ConvertFn = fn(f32, &mut [u8]);

/// Supported device sample representations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// Signed 8-bit
    S8,
    /// Unsigned 8-bit
    U8,
    /// Signed 16-bit little-endian
    S16Le,
    /// Signed 16-bit big-endian
    S16Be,
    /// Unsigned 16-bit little-endian
    U16Le,
    /// Unsigned 16-bit big-endian
    U16Be,
    /// Signed 32-bit little-endian
    S32Le,
    /// 32-bit IEEE float little-endian
    F32Le,
}

impl SampleFormat {
    /// Every supported representation
    pub const ALL: [SampleFormat; 8] = [
        SampleFormat::S8,
        SampleFormat::U8,
        SampleFormat::S16Le,
        SampleFormat::S16Be,
        SampleFormat::U16Le,
        SampleFormat::U16Be,
        SampleFormat::S32Le,
        SampleFormat::F32Le,
    ];

    /// Size of one encoded sample in bytes
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::S8 | SampleFormat::U8 => 1,
            SampleFormat::S16Le | SampleFormat::S16Be | SampleFormat::U16Le | SampleFormat::U16Be => 2,
            SampleFormat::S32Le | SampleFormat::F32Le => 4,
        }
    }

    /// Short lowercase name as used in config files
    pub fn name(&self) -> &'static str {
        match self {
            SampleFormat::S8 => "s8",
            SampleFormat::U8 => "u8",
            SampleFormat::S16Le => "s16le",
            SampleFormat::S16Be => "s16be",
            SampleFormat::U16Le => "u16le",
            SampleFormat::U16Be => "u16be",
            SampleFormat::S32Le => "s32le",
            SampleFormat::F32Le => "f32le",
        }
    }

    /// Select the float → device converter for this representation
    pub fn converter(self) -> SampleConverter {
        let convert: ConvertFn = match self {
            SampleFormat::S8 => float_to_s8,
            SampleFormat::U8 => float_to_u8,
            SampleFormat::S16Le => float_to_s16le,
            SampleFormat::S16Be => float_to_s16be,
            SampleFormat::U16Le => float_to_u16le,
            SampleFormat::U16Be => float_to_u16be,
            SampleFormat::S32Le => float_to_s32le,
            SampleFormat::F32Le => float_to_f32le,
        };

        SampleConverter {
            format: self,
            convert,
        }
    }

    /// Decode one device sample back to float
    ///
    /// Inverse of the converter, exact for the boundary codes. Used by tests
    /// and diagnostics; the playback path never converts back.
    pub fn to_float(&self, bytes: &[u8]) -> f32 {
        match self {
            SampleFormat::S8 => signed_to_float(bytes[0] as i8 as f64, 128.0, 127.0),
            SampleFormat::U8 => signed_to_float(bytes[0] as f64 - 128.0, 128.0, 127.0),
            SampleFormat::S16Le => {
                signed_to_float(i16::from_le_bytes([bytes[0], bytes[1]]) as f64, 32768.0, 32767.0)
            }
            SampleFormat::S16Be => {
                signed_to_float(i16::from_be_bytes([bytes[0], bytes[1]]) as f64, 32768.0, 32767.0)
            }
            SampleFormat::U16Le => signed_to_float(
                u16::from_le_bytes([bytes[0], bytes[1]]) as f64 - 32768.0,
                32768.0,
                32767.0,
            ),
            SampleFormat::U16Be => signed_to_float(
                u16::from_be_bytes([bytes[0], bytes[1]]) as f64 - 32768.0,
                32768.0,
                32767.0,
            ),
            SampleFormat::S32Le => signed_to_float(
                i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
                2_147_483_648.0,
                2_147_483_647.0,
            ),
            SampleFormat::F32Le => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SampleFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "s8" => Ok(SampleFormat::S8),
            "u8" => Ok(SampleFormat::U8),
            "s16" | "s16le" | "s16lsb" => Ok(SampleFormat::S16Le),
            "s16be" | "s16msb" => Ok(SampleFormat::S16Be),
            "u16" | "u16le" | "u16lsb" => Ok(SampleFormat::U16Le),
            "u16be" | "u16msb" => Ok(SampleFormat::U16Be),
            "s32" | "s32le" | "s32lsb" => Ok(SampleFormat::S32Le),
            "f32" | "f32le" | "f32lsb" => Ok(SampleFormat::F32Le),
            other => Err(crate::Error::InvalidInput(format!(
                "unsupported sample format '{}'",
                other
            ))),
        }
    }
}

/// Float → device converter bound to one representation
#[derive(Clone, Copy)]
pub struct SampleConverter {
    format: SampleFormat,
    convert: ConvertFn,
}

impl SampleConverter {
    /// Representation this converter writes
    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Bytes written per sample
    pub fn bytes_per_sample(&self) -> usize {
        self.format.bytes_per_sample()
    }

    /// Convert a single sample into `out` (exactly one sample wide)
    #[inline]
    pub fn convert(&self, sample: f32, out: &mut [u8]) {
        (self.convert)(sample, out)
    }

    /// Convert a run of samples, in order, into `out`
    ///
    /// Converts `min(samples.len(), out.len() / bytes_per_sample)` samples.
    pub fn convert_slice(&self, samples: &[f32], out: &mut [u8]) {
        let width = self.bytes_per_sample();
        for (sample, chunk) in samples.iter().zip(out.chunks_exact_mut(width)) {
            (self.convert)(*sample, chunk);
        }
    }

    /// Fill `out` with the representation's zero level
    pub fn fill_silence(&self, out: &mut [u8]) {
        let width = self.bytes_per_sample();
        for chunk in out.chunks_exact_mut(width) {
            (self.convert)(0.0, chunk);
        }
    }
}

impl fmt::Debug for SampleConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleConverter")
            .field("format", &self.format)
            .finish()
    }
}

/// Clamp, scale asymmetrically and round half away from zero
#[inline]
fn quantize(sample: f32, negative_scale: f64, positive_scale: f64) -> f64 {
    if sample.is_nan() {
        return 0.0;
    }
    let s = sample.clamp(-1.0, 1.0) as f64;
    if s < 0.0 {
        (s * negative_scale).round()
    } else {
        (s * positive_scale).round()
    }
}

#[inline]
fn signed_to_float(value: f64, negative_scale: f64, positive_scale: f64) -> f32 {
    if value < 0.0 {
        (value / negative_scale) as f32
    } else {
        (value / positive_scale) as f32
    }
}

#[inline]
fn to_i16(sample: f32) -> i16 {
    quantize(sample, 32768.0, 32767.0) as i16
}

fn float_to_s8(sample: f32, out: &mut [u8]) {
    out[0] = quantize(sample, 128.0, 127.0) as i8 as u8;
}

fn float_to_u8(sample: f32, out: &mut [u8]) {
    out[0] = (quantize(sample, 128.0, 127.0) + 128.0) as u8;
}

fn float_to_s16le(sample: f32, out: &mut [u8]) {
    out.copy_from_slice(&to_i16(sample).to_le_bytes());
}

fn float_to_s16be(sample: f32, out: &mut [u8]) {
    out.copy_from_slice(&to_i16(sample).to_be_bytes());
}

fn float_to_u16le(sample: f32, out: &mut [u8]) {
    let value = (to_i16(sample) as i32 + 32768) as u16;
    out.copy_from_slice(&value.to_le_bytes());
}

fn float_to_u16be(sample: f32, out: &mut [u8]) {
    let value = (to_i16(sample) as i32 + 32768) as u16;
    out.copy_from_slice(&value.to_be_bytes());
}

fn float_to_s32le(sample: f32, out: &mut [u8]) {
    let value = quantize(sample, 2_147_483_648.0, 2_147_483_647.0) as i32;
    out.copy_from_slice(&value.to_le_bytes());
}

fn float_to_f32le(sample: f32, out: &mut [u8]) {
    let value = if sample.is_nan() {
        0.0
    } else {
        sample.clamp(-1.0, 1.0)
    };
    out.copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(format: SampleFormat, sample: f32) -> Vec<u8> {
        let mut out = vec![0u8; format.bytes_per_sample()];
        format.converter().convert(sample, &mut out);
        out
    }

    #[test]
    fn test_s16le_boundaries() {
        assert_eq!(encode(SampleFormat::S16Le, -1.0), i16::MIN.to_le_bytes());
        assert_eq!(encode(SampleFormat::S16Le, 0.0), 0i16.to_le_bytes());
        assert_eq!(encode(SampleFormat::S16Le, 1.0), i16::MAX.to_le_bytes());
    }

    #[test]
    fn test_s16be_is_byte_swapped_s16le() {
        let le = encode(SampleFormat::S16Le, 0.3);
        let be = encode(SampleFormat::S16Be, 0.3);
        assert_eq!(le[0], be[1]);
        assert_eq!(le[1], be[0]);
    }

    #[test]
    fn test_u8_boundaries() {
        assert_eq!(encode(SampleFormat::U8, -1.0), vec![0]);
        assert_eq!(encode(SampleFormat::U8, 0.0), vec![128]);
        assert_eq!(encode(SampleFormat::U8, 1.0), vec![255]);
    }

    #[test]
    fn test_s8_boundaries() {
        assert_eq!(encode(SampleFormat::S8, -1.0), vec![i8::MIN as u8]);
        assert_eq!(encode(SampleFormat::S8, 0.0), vec![0]);
        assert_eq!(encode(SampleFormat::S8, 1.0), vec![i8::MAX as u8]);
    }

    #[test]
    fn test_u16_boundaries() {
        assert_eq!(encode(SampleFormat::U16Le, -1.0), 0u16.to_le_bytes());
        assert_eq!(encode(SampleFormat::U16Le, 0.0), 32768u16.to_le_bytes());
        assert_eq!(encode(SampleFormat::U16Be, 1.0), u16::MAX.to_be_bytes());
    }

    #[test]
    fn test_s32le_boundaries() {
        assert_eq!(encode(SampleFormat::S32Le, -1.0), i32::MIN.to_le_bytes());
        assert_eq!(encode(SampleFormat::S32Le, 0.0), 0i32.to_le_bytes());
        assert_eq!(encode(SampleFormat::S32Le, 1.0), i32::MAX.to_le_bytes());
    }

    #[test]
    fn test_saturation() {
        assert_eq!(encode(SampleFormat::S16Le, 3.5), i16::MAX.to_le_bytes());
        assert_eq!(encode(SampleFormat::S16Le, -7.0), i16::MIN.to_le_bytes());
        assert_eq!(encode(SampleFormat::U8, 2.0), vec![255]);
        assert_eq!(encode(SampleFormat::F32Le, 1.5), 1.0f32.to_le_bytes());
    }

    #[test]
    fn test_nan_is_silence() {
        assert_eq!(encode(SampleFormat::S16Le, f32::NAN), 0i16.to_le_bytes());
        assert_eq!(encode(SampleFormat::U8, f32::NAN), vec![128]);
        assert_eq!(encode(SampleFormat::F32Le, f32::NAN), 0.0f32.to_le_bytes());
    }

    #[test]
    fn test_half_rounds_away_from_zero() {
        // 0.5 * 32767 = 16383.5
        assert_eq!(encode(SampleFormat::S16Le, 0.5), 16384i16.to_le_bytes());
        // -0.5 * 32768 = -16384 exactly
        assert_eq!(encode(SampleFormat::S16Le, -0.5), (-16384i16).to_le_bytes());
    }

    #[test]
    fn test_fill_silence_unsigned() {
        let converter = SampleFormat::U16Be.converter();
        let mut out = vec![0u8; 8];
        converter.fill_silence(&mut out);
        assert_eq!(out, vec![0x80, 0x00, 0x80, 0x00, 0x80, 0x00, 0x80, 0x00]);
    }

    #[test]
    fn test_convert_slice_order() {
        let converter = SampleFormat::S8.converter();
        let mut out = vec![0u8; 3];
        converter.convert_slice(&[1.0, 0.0, -1.0], &mut out);
        assert_eq!(out, vec![127, 0, 128]);
    }

    /// Largest rounding error one encode can introduce
    fn half_step(format: SampleFormat) -> f32 {
        match format {
            SampleFormat::S8 | SampleFormat::U8 => 0.5 / 127.0,
            SampleFormat::S16Le | SampleFormat::S16Be | SampleFormat::U16Le | SampleFormat::U16Be => {
                0.5 / 32767.0
            }
            SampleFormat::S32Le => 0.5 / 2_147_483_647.0,
            SampleFormat::F32Le => 0.0,
        }
    }

    #[test]
    fn test_decode_inverts_encode_within_half_a_step() {
        for format in SampleFormat::ALL {
            let tolerance = half_step(format) + 1e-7;
            for i in 0..=2000 {
                let sample = i as f32 / 1000.0 - 1.0;
                let decoded = format.to_float(&encode(format, sample));
                assert!(
                    (decoded - sample).abs() <= tolerance,
                    "{}: {} came back as {}",
                    format,
                    sample,
                    decoded
                );
            }

            for exact in [-1.0f32, 0.0, 1.0] {
                assert_eq!(format.to_float(&encode(format, exact)), exact, "{}", format);
            }
        }
    }

    #[test]
    fn test_parse_names() {
        for format in SampleFormat::ALL {
            assert_eq!(format.name().parse::<SampleFormat>().unwrap(), format);
        }
        assert_eq!("S16".parse::<SampleFormat>().unwrap(), SampleFormat::S16Le);
        assert_eq!("f32lsb".parse::<SampleFormat>().unwrap(), SampleFormat::F32Le);
        assert!("s24le".parse::<SampleFormat>().is_err());
    }
}
