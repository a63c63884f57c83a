//! Streaming sample rate conversion
//!
//! Each stream owns a [`RateConverter`] that turns interleaved frames at the
//! decoder's native rate into frames at the device rate. Converters keep
//! their phase between calls, so the output is identical however the input
//! and output are split across callbacks.
//!
//! Two interpolators are available:
//! - [`LinearResampler`]: linear interpolation driven by an exact rational
//!   phase accumulator (no drift, no allocation after construction)
//! - [`PolynomialResampler`]: rubato's `FastFixedIn` with cubic polynomial
//!   interpolation, fed in fixed-size chunks

use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Interpolation used when stream and device rates differ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    #[default]
    Linear,
    Polynomial,
}

impl FromStr for Interpolation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(Interpolation::Linear),
            "polynomial" | "cubic" => Ok(Interpolation::Polynomial),
            other => Err(format!("unknown interpolation '{}'", other)),
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interpolation::Linear => f.write_str("linear"),
            Interpolation::Polynomial => f.write_str("polynomial"),
        }
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Linear interpolator with an exact rational phase.
///
/// The output position advances by `src / dst` input frames per output
/// frame (rates reduced by their gcd). The fractional part lives in `frac`
/// as an integer numerator over `dst`, so no error accumulates.
#[derive(Debug, Clone)]
pub struct LinearResampler {
    channels: usize,
    src: u64,
    dst: u64,
    /// Numerator of the position between `a` and `b`, in `[0, dst)` once
    /// pending advances are applied
    frac: u64,
    a: Vec<f32>,
    b: Vec<f32>,
    /// Frames currently held in `a` / `b` (0..=2)
    loaded: usize,
    /// Last input frame duplicated into `b` for the end-of-stream tail
    holding: bool,
}

impl LinearResampler {
    pub fn new(src_rate: u32, dst_rate: u32, channels: u16) -> Result<Self> {
        if src_rate == 0 || dst_rate == 0 || channels == 0 {
            return Err(Error::Resampler(format!(
                "Invalid conversion {} Hz -> {} Hz with {} channels",
                src_rate, dst_rate, channels
            )));
        }
        let divisor = gcd(src_rate as u64, dst_rate as u64);
        Ok(Self {
            channels: channels as usize,
            src: src_rate as u64 / divisor,
            dst: dst_rate as u64 / divisor,
            frac: 0,
            a: vec![0.0; channels as usize],
            b: vec![0.0; channels as usize],
            loaded: 0,
            holding: false,
        })
    }

    fn drop_front(&mut self) {
        if self.loaded == 2 {
            self.a.copy_from_slice(&self.b);
        }
        self.loaded -= 1;
    }

    fn load(&mut self, frame: &[f32]) {
        match self.loaded {
            0 => self.a.copy_from_slice(frame),
            _ => self.b.copy_from_slice(frame),
        }
        self.loaded += 1;
    }

    pub fn process(&mut self, input: &[f32], output: &mut [f32]) -> (usize, usize) {
        let ch = self.channels;
        let in_frames = input.len() / ch;
        let out_frames = output.len() / ch;
        let mut consumed = 0;
        let mut produced = 0;

        loop {
            while self.frac >= self.dst && self.loaded > 0 {
                self.drop_front();
                self.frac -= self.dst;
            }

            if produced == out_frames {
                break;
            }

            if self.frac >= self.dst {
                // Window is empty and the position is still ahead: skip input
                if consumed == in_frames {
                    break;
                }
                consumed += 1;
                self.frac -= self.dst;
                continue;
            }

            if self.loaded < 2 {
                if consumed == in_frames {
                    break;
                }
                self.load(&input[consumed * ch..(consumed + 1) * ch]);
                consumed += 1;
                continue;
            }

            let t = (self.frac as f64 / self.dst as f64) as f32;
            let out = &mut output[produced * ch..(produced + 1) * ch];
            for ((o, a), b) in out.iter_mut().zip(&self.a).zip(&self.b) {
                *o = a + (b - a) * t;
            }
            produced += 1;
            self.frac += self.src;
        }

        (consumed, produced)
    }

    /// Emit the positions that fall between the last input frame and the
    /// end of the stream, holding that frame. Returns frames produced; 0 once
    /// the tail is fully drained.
    pub fn flush(&mut self, output: &mut [f32]) -> usize {
        let ch = self.channels;
        let mut produced = 0;
        loop {
            let (_, made) = self.process(&[], &mut output[produced * ch..]);
            produced += made;
            if self.loaded == 1 && !self.holding {
                self.b.copy_from_slice(&self.a);
                self.loaded = 2;
                self.holding = true;
                continue;
            }
            return produced;
        }
    }

    pub fn reset(&mut self) {
        self.frac = 0;
        self.loaded = 0;
        self.holding = false;
    }
}

/// Chunked wrapper around rubato's polynomial resampler.
///
/// rubato wants a fixed number of planar input frames per call, so input is
/// staged until a chunk is full and output is drained from a planar buffer.
pub struct PolynomialResampler {
    inner: FastFixedIn<f32>,
    channels: usize,
    chunk: usize,
    in_planar: Vec<Vec<f32>>,
    in_fill: usize,
    out_planar: Vec<Vec<f32>>,
    out_pos: usize,
    out_len: usize,
    ratio: f64,
    /// rubato's leading delay, in output frames
    delay: usize,
    /// Leading delay frames still to be discarded
    delay_left: usize,
    in_total: u64,
    out_total: u64,
    /// Output frame count owed for the whole stream, fixed at end of stream
    limit: Option<u64>,
    flush_rounds: u32,
    max_flush_rounds: u32,
}

impl PolynomialResampler {
    pub fn new(src_rate: u32, dst_rate: u32, channels: u16, chunk: usize) -> Result<Self> {
        if src_rate == 0 || dst_rate == 0 || channels == 0 || chunk == 0 {
            return Err(Error::Resampler(format!(
                "Invalid conversion {} Hz -> {} Hz with {} channels",
                src_rate, dst_rate, channels
            )));
        }

        let inner = FastFixedIn::<f32>::new(
            dst_rate as f64 / src_rate as f64,
            1.0,
            PolynomialDegree::Cubic,
            chunk,
            channels as usize,
        )
        .map_err(|e| Error::Resampler(format!("Failed to create resampler: {}", e)))?;

        let out_max = inner.output_frames_max();
        let delay = inner.output_delay();
        let ratio = dst_rate as f64 / src_rate as f64;
        // Zero-padded chunks needed to push the staged tail and the delay out
        let chunk_out = ((chunk as f64 * ratio) as usize).max(1);
        let max_flush_rounds = 2 + (delay / chunk_out) as u32;
        debug!(
            "Polynomial resampler {} Hz -> {} Hz, chunk {} frames, up to {} out",
            src_rate, dst_rate, chunk, out_max
        );

        Ok(Self {
            inner,
            channels: channels as usize,
            chunk,
            in_planar: vec![vec![0.0; chunk]; channels as usize],
            in_fill: 0,
            out_planar: vec![vec![0.0; out_max]; channels as usize],
            out_pos: 0,
            out_len: 0,
            ratio,
            delay,
            delay_left: delay,
            in_total: 0,
            out_total: 0,
            limit: None,
            flush_rounds: 0,
            max_flush_rounds,
        })
    }

    pub fn process(&mut self, input: &[f32], output: &mut [f32]) -> (usize, usize) {
        let ch = self.channels;
        let in_frames = input.len() / ch;
        let out_frames = output.len() / ch;
        let mut consumed = 0;
        let mut produced = 0;

        loop {
            self.drain(output, &mut produced);

            if produced == out_frames {
                break;
            }

            while self.in_fill < self.chunk && consumed < in_frames {
                for (c, plane) in self.in_planar.iter_mut().enumerate() {
                    plane[self.in_fill] = input[consumed * ch + c];
                }
                self.in_fill += 1;
                consumed += 1;
                self.in_total += 1;
            }

            if self.in_fill < self.chunk {
                break;
            }

            self.run_chunk();
        }

        (consumed, produced)
    }

    /// Copy converted frames out, dropping the leading delay and anything
    /// past the end-of-stream limit
    fn drain(&mut self, output: &mut [f32], produced: &mut usize) {
        let ch = self.channels;
        let out_frames = output.len() / ch;
        while self.out_pos < self.out_len && *produced < out_frames {
            if self.delay_left > 0 {
                self.delay_left -= 1;
                self.out_pos += 1;
                continue;
            }
            if self.limit.is_some_and(|limit| self.out_total >= limit) {
                self.out_pos = self.out_len;
                break;
            }
            for (c, plane) in self.out_planar.iter().enumerate() {
                output[*produced * ch + c] = plane[self.out_pos];
            }
            self.out_pos += 1;
            self.out_total += 1;
            *produced += 1;
        }
    }

    fn run_chunk(&mut self) {
        self.in_fill = 0;
        self.out_pos = 0;
        self.out_len = match self
            .inner
            .process_into_buffer(&self.in_planar, &mut self.out_planar, None)
        {
            Ok((_, written)) => written,
            Err(_) => 0,
        };
    }

    /// Push the staged partial chunk and rubato's delay line out with
    /// silence, stopping at the frame count the input length calls for.
    /// Returns frames produced; 0 once the tail is fully drained.
    pub fn flush(&mut self, output: &mut [f32]) -> usize {
        let out_frames = output.len() / self.channels;
        let limit = *self
            .limit
            .get_or_insert((self.in_total as f64 * self.ratio).round() as u64);
        let mut produced = 0;

        loop {
            self.drain(output, &mut produced);
            if produced == out_frames
                || self.out_total >= limit
                || self.flush_rounds >= self.max_flush_rounds
            {
                return produced;
            }
            for plane in self.in_planar.iter_mut() {
                plane[self.in_fill..].fill(0.0);
            }
            self.flush_rounds += 1;
            self.run_chunk();
        }
    }

    pub fn reset(&mut self) {
        self.inner.reset();
        self.in_fill = 0;
        self.out_pos = 0;
        self.out_len = 0;
        self.delay_left = self.delay;
        self.in_total = 0;
        self.out_total = 0;
        self.limit = None;
        self.flush_rounds = 0;
    }
}

/// Per-stream rate conversion state
pub enum RateConverter {
    /// Native rate equals the device rate
    Passthrough { channels: usize },
    Linear(LinearResampler),
    Polynomial(PolynomialResampler),
}

impl RateConverter {
    /// Build a converter from `src_rate` to `dst_rate`.
    ///
    /// `chunk` is the polynomial resampler's input chunk size in frames.
    pub fn new(
        interpolation: Interpolation,
        src_rate: u32,
        dst_rate: u32,
        channels: u16,
        chunk: usize,
    ) -> Result<Self> {
        if src_rate == dst_rate {
            return Ok(RateConverter::Passthrough {
                channels: channels.max(1) as usize,
            });
        }
        match interpolation {
            Interpolation::Linear => Ok(RateConverter::Linear(LinearResampler::new(
                src_rate, dst_rate, channels,
            )?)),
            Interpolation::Polynomial => Ok(RateConverter::Polynomial(
                PolynomialResampler::new(src_rate, dst_rate, channels, chunk)?,
            )),
        }
    }

    /// Convert as much as possible from `input` into `output`.
    ///
    /// Both slices hold interleaved frames. Returns `(consumed, produced)`
    /// in frames; consumed input must be discarded by the caller.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) -> (usize, usize) {
        match self {
            RateConverter::Passthrough { channels } => {
                let frames = (input.len() / *channels).min(output.len() / *channels);
                let samples = frames * *channels;
                output[..samples].copy_from_slice(&input[..samples]);
                (frames, frames)
            }
            RateConverter::Linear(linear) => linear.process(input, output),
            RateConverter::Polynomial(poly) => poly.process(input, output),
        }
    }

    /// Emit whatever the converter still owes once its input has ended.
    ///
    /// Call repeatedly until it returns fewer frames than `output` holds.
    pub fn flush(&mut self, output: &mut [f32]) -> usize {
        match self {
            RateConverter::Passthrough { .. } => 0,
            RateConverter::Linear(linear) => linear.flush(output),
            RateConverter::Polynomial(poly) => poly.flush(output),
        }
    }

    /// Forget buffered frames and phase (after a seek or rewind)
    pub fn reset(&mut self) {
        match self {
            RateConverter::Passthrough { .. } => {}
            RateConverter::Linear(linear) => linear.reset(),
            RateConverter::Polynomial(poly) => poly.reset(),
        }
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(self, RateConverter::Passthrough { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_split(conv: &mut RateConverter, input: &[f32], in_step: usize, out_step: usize, ch: usize) -> Vec<f32> {
        let mut out = Vec::new();
        let mut pos = 0;
        let mut buf = vec![0.0f32; out_step * ch];
        loop {
            let end = (pos + in_step * ch).min(input.len());
            let (consumed, produced) = conv.process(&input[pos..end], &mut buf);
            out.extend_from_slice(&buf[..produced * ch]);
            pos += consumed * ch;
            if consumed == 0 && produced == 0 {
                break;
            }
        }
        out
    }

    fn run_to_end(conv: &mut RateConverter, input: &[f32], in_step: usize, out_step: usize, ch: usize) -> Vec<f32> {
        let mut out = run_split(conv, input, in_step, out_step, ch);
        let mut buf = vec![0.0f32; out_step * ch];
        loop {
            let produced = conv.flush(&mut buf);
            out.extend_from_slice(&buf[..produced * ch]);
            if produced < out_step {
                break;
            }
        }
        out
    }

    #[test]
    fn test_passthrough_copies() {
        let mut conv = RateConverter::new(Interpolation::Linear, 48000, 48000, 2, 64).unwrap();
        assert!(conv.is_passthrough());

        let input = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        let mut output = [0.0; 4];
        assert_eq!(conv.process(&input, &mut output), (2, 2));
        assert_eq!(output, [0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_linear_rejects_zero_rate() {
        assert!(matches!(
            LinearResampler::new(0, 44100, 2),
            Err(Error::Resampler(_))
        ));
    }

    #[test]
    fn test_linear_halving_picks_every_other_frame() {
        let mut conv = RateConverter::new(Interpolation::Linear, 16000, 8000, 1, 64).unwrap();
        let input: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let mut output = [0.0; 4];

        let (consumed, produced) = conv.process(&input, &mut output);
        assert_eq!(produced, 4);
        assert!(consumed <= input.len());
        assert_eq!(output, [0.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_linear_doubling_interpolates_midpoints() {
        let mut conv = RateConverter::new(Interpolation::Linear, 8000, 16000, 1, 64).unwrap();
        let input = [0.0, 1.0, 2.0, 3.0];
        let mut output = [0.0; 6];

        let (_, produced) = conv.process(&input, &mut output);
        assert_eq!(produced, 6);
        assert_eq!(output, [0.0, 0.5, 1.0, 1.5, 2.0, 2.5]);
    }

    #[test]
    fn test_linear_constant_stays_exact() {
        let mut conv = RateConverter::new(Interpolation::Linear, 44100, 48000, 2, 64).unwrap();
        let input = vec![0.5f32; 2 * 441];
        let mut output = vec![0.0f32; 2 * 400];

        let (_, produced) = conv.process(&input, &mut output);
        assert_eq!(produced, 400);
        assert!(output.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_linear_split_matches_single_pass() {
        let input: Vec<f32> = (0..2000).map(|i| ((i as f32) * 0.01).sin()).collect();

        let mut whole = RateConverter::new(Interpolation::Linear, 44100, 48000, 1, 64).unwrap();
        let expected = run_split(&mut whole, &input, 2000, 4000, 1);

        let mut split = RateConverter::new(Interpolation::Linear, 44100, 48000, 1, 64).unwrap();
        let actual = run_split(&mut split, &input, 37, 13, 1);

        assert_eq!(expected, actual);
    }

    #[test]
    fn test_linear_ratio_is_exact_over_long_run() {
        // 3 input frames per 2 output frames
        let mut conv = RateConverter::new(Interpolation::Linear, 48000, 32000, 1, 64).unwrap();
        let input = vec![0.25f32; 30001];
        let out = run_split(&mut conv, &input, 1000, 512, 1);
        assert_eq!(out.len(), 20000);
    }

    #[test]
    fn test_linear_flush_emits_last_frame() {
        let mut conv = RateConverter::new(Interpolation::Linear, 8000, 16000, 1, 64).unwrap();
        let input: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let out = run_to_end(&mut conv, &input, 100, 7, 1);

        assert_eq!(out.len(), 200);
        assert_eq!(&out[196..], &[98.0, 98.5, 99.0, 99.0]);

        let mut buf = [0.0f32; 4];
        assert_eq!(conv.flush(&mut buf), 0);
    }

    #[test]
    fn test_linear_flush_covers_every_position_when_downsampling() {
        // 16 kHz -> 8 kHz keeps frames 0, 2, 4, 6 of 7
        let mut conv = RateConverter::new(Interpolation::Linear, 16000, 8000, 1, 64).unwrap();
        let input: Vec<f32> = (0..7).map(|i| i as f32).collect();
        let out = run_to_end(&mut conv, &input, 7, 16, 1);
        assert_eq!(out, vec![0.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_linear_reset_restarts_phase() {
        let mut conv = RateConverter::new(Interpolation::Linear, 8000, 16000, 1, 64).unwrap();
        let mut output = [0.0; 3];
        conv.process(&[1.0, 2.0, 3.0], &mut output);

        conv.reset();
        let mut output = [0.0; 1];
        conv.process(&[7.0, 8.0], &mut output);
        assert_eq!(output, [7.0]);
    }

    #[test]
    fn test_polynomial_produces_expected_ratio() {
        let mut conv = RateConverter::new(Interpolation::Polynomial, 44100, 48000, 2, 256).unwrap();
        let input = vec![0.0f32; 2 * 44100];
        let out = run_split(&mut conv, &input, 1000, 333, 2);

        let frames = out.len() / 2;
        // One partial chunk may remain staged
        assert!(frames > 47000 && frames <= 48000, "got {}", frames);
    }

    #[test]
    fn test_polynomial_flush_drains_short_input() {
        // Shorter than two chunks, so most of it sits in the staging buffer
        let mut conv = RateConverter::new(Interpolation::Polynomial, 44100, 48000, 1, 256).unwrap();
        let input = vec![0.5f32; 500];
        let out = run_to_end(&mut conv, &input, 500, 128, 1);

        // round(500 * 48000 / 44100)
        assert_eq!(out.len(), 544);
        for (i, &s) in out[8..530].iter().enumerate() {
            assert!((s - 0.5).abs() < 1e-3, "frame {}: {}", i + 8, s);
        }

        let mut buf = [0.0f32; 16];
        assert_eq!(conv.flush(&mut buf), 0);
    }

    #[test]
    fn test_polynomial_reset_rearms_flush() {
        let mut conv = RateConverter::new(Interpolation::Polynomial, 22050, 44100, 1, 64).unwrap();
        let input = vec![0.25f32; 100];
        assert_eq!(run_to_end(&mut conv, &input, 100, 64, 1).len(), 200);

        conv.reset();
        assert_eq!(run_to_end(&mut conv, &input, 30, 50, 1).len(), 200);
    }

    #[test]
    fn test_passthrough_has_nothing_to_flush() {
        let mut conv = RateConverter::new(Interpolation::Polynomial, 8000, 8000, 1, 64).unwrap();
        let mut buf = [0.0f32; 8];
        assert_eq!(conv.flush(&mut buf), 0);
    }

    #[test]
    fn test_interpolation_parse() {
        assert_eq!("Linear".parse::<Interpolation>().unwrap(), Interpolation::Linear);
        assert_eq!(
            "polynomial".parse::<Interpolation>().unwrap(),
            Interpolation::Polynomial
        );
        assert!("sinc".parse::<Interpolation>().is_err());
    }
}
