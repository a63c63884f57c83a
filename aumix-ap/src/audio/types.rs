//! Core audio data types
//!
//! [`DeviceSpec`] describes the negotiated output format; [`adapt_channels`]
//! reshapes decoded frames to the device channel count.

use aumix_common::SampleFormat;
use std::fmt;

/// Output device format
///
/// Channel count is 1 or 2 once a session has negotiated it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSpec {
    /// Frames per second
    pub sample_rate: u32,

    /// Interleaved channels per frame
    pub channels: u16,

    /// Device sample representation
    pub format: SampleFormat,

    /// Frames per callback block; mix buffers are sized for this. A device
    /// that picks its own buffer size may call back with other lengths,
    /// which are mixed in pieces of this size.
    pub block_frames: usize,
}

impl DeviceSpec {
    /// Bytes per interleaved frame in device format
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * self.format.bytes_per_sample()
    }

    /// Bytes in one full block
    pub fn block_bytes(&self) -> usize {
        self.block_frames * self.bytes_per_frame()
    }

    /// Float samples in one full block
    pub fn block_samples(&self) -> usize {
        self.block_frames * self.channels as usize
    }

    /// Whole frames that fit in `bytes`
    pub fn frames_in(&self, bytes: usize) -> usize {
        match self.bytes_per_frame() {
            0 => 0,
            per_frame => bytes / per_frame,
        }
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {}, {} frames/block",
            self.sample_rate, self.channels, self.format, self.block_frames
        )
    }
}

/// Copy interleaved frames from `input` to `output`, changing channel count.
///
/// - same count: copied unchanged
/// - mono to N: the sample is duplicated into every output channel
/// - N to mono: channels are averaged
/// - N to stereo (N > 2): the first two channels are kept
///
/// Converts as many whole frames as fit in both slices and returns that
/// frame count.
pub fn adapt_channels(input: &[f32], in_channels: u16, output: &mut [f32], out_channels: u16) -> usize {
    let in_ch = in_channels as usize;
    let out_ch = out_channels as usize;
    if in_ch == 0 || out_ch == 0 {
        return 0;
    }

    let frames = (input.len() / in_ch).min(output.len() / out_ch);
    let input = &input[..frames * in_ch];
    let output = &mut output[..frames * out_ch];

    if in_ch == out_ch {
        output.copy_from_slice(input);
    } else if in_ch == 1 {
        for (sample, frame) in input.iter().zip(output.chunks_exact_mut(out_ch)) {
            frame.fill(*sample);
        }
    } else if out_ch == 1 {
        let scale = 1.0 / in_ch as f32;
        for (frame, sample) in input.chunks_exact(in_ch).zip(output.iter_mut()) {
            *sample = frame.iter().sum::<f32>() * scale;
        }
    } else {
        let keep = in_ch.min(out_ch);
        for (src, dst) in input.chunks_exact(in_ch).zip(output.chunks_exact_mut(out_ch)) {
            dst[..keep].copy_from_slice(&src[..keep]);
            dst[keep..].fill(0.0);
        }
    }

    frames
}
