//! Per-stream decode-ahead pipeline
//!
//! decoder -> channel adaptation -> FIFO at native rate -> rate converter
//!
//! All buffers are sized when the pipeline is built on the control context;
//! pulling from the output callback never allocates.

use crate::audio::decoder::AudioDecoder;
use crate::audio::resampler::{Interpolation, RateConverter};
use crate::audio::types::{adapt_channels, DeviceSpec};
use crate::error::{Error, Result};
use tracing::debug;

/// Consecutive empty "call again" decodes tolerated in one refill
const MAX_EMPTY_DECODES: u32 = 8;

/// Outcome of one attempt to top up the FIFO
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Refill {
    Filled,
    /// Decoder has nothing yet but expects more; try again next pull
    Stalled,
    Ended,
}

/// Decode, adapt and resample state for one stream
pub struct Pipeline {
    in_channels: u16,
    out_channels: u16,
    /// Raw decoder output, native channel layout
    decode_buf: Vec<f32>,
    /// Channel-adapted frames waiting for the rate converter
    fifo: Vec<f32>,
    fifo_start: usize,
    fifo_len: usize,
    converter: RateConverter,
    /// Decoder reported end of stream
    eos: bool,
    /// Converter tail flushed after `eos`; nothing more will come out
    drained: bool,
}

impl Pipeline {
    /// Build a pipeline from an open decoder to the device format
    pub fn new(decoder: &dyn AudioDecoder, spec: &DeviceSpec, interpolation: Interpolation) -> Result<Self> {
        if !decoder.is_open() {
            return Err(Error::NotOpen);
        }
        let in_channels = decoder.channels();
        let rate = decoder.rate();
        if in_channels == 0 || rate == 0 {
            return Err(Error::Open(format!(
                "Decoder reported {} channels at {} Hz",
                in_channels, rate
            )));
        }

        let chunk = spec.block_frames.max(1);
        let converter = RateConverter::new(interpolation, rate, spec.sample_rate, spec.channels, chunk)?;

        debug!(
            "Stream pipeline: {} ch @ {} Hz -> {} ch @ {} Hz ({})",
            in_channels,
            rate,
            spec.channels,
            spec.sample_rate,
            if converter.is_passthrough() {
                "no resampling".to_string()
            } else {
                interpolation.to_string()
            }
        );

        Ok(Self {
            in_channels,
            out_channels: spec.channels,
            decode_buf: vec![0.0; chunk * in_channels as usize],
            fifo: vec![0.0; chunk * spec.channels as usize],
            fifo_start: 0,
            fifo_len: 0,
            converter,
            eos: false,
            drained: false,
        })
    }

    /// Fill `out` with device-rate frames in the device channel layout.
    ///
    /// Returns the number of frames written. A short count means either the
    /// stream is over ([`Pipeline::is_drained`]) or the decoder stalled and
    /// the next pull should try again.
    pub fn pull(&mut self, decoder: &mut dyn AudioDecoder, out: &mut [f32]) -> usize {
        let ch = self.out_channels as usize;
        let wanted = out.len() / ch;
        let mut produced = 0;

        while produced < wanted && !self.drained {
            if self.fifo_len == 0 {
                if self.eos {
                    produced += self.converter.flush(&mut out[produced * ch..wanted * ch]);
                    if produced < wanted {
                        self.drained = true;
                    }
                    break;
                }
                if self.refill(decoder) == Refill::Stalled {
                    break;
                }
                continue;
            }

            let input = &self.fifo[self.fifo_start..self.fifo_start + self.fifo_len];
            let (consumed, made) = self
                .converter
                .process(input, &mut out[produced * ch..wanted * ch]);

            self.fifo_start += consumed * ch;
            self.fifo_len -= consumed * ch;
            produced += made;

            if consumed == 0 && made == 0 {
                break;
            }
        }

        produced
    }

    /// Decode the next run of frames into the FIFO
    fn refill(&mut self, decoder: &mut dyn AudioDecoder) -> Refill {
        let in_ch = self.in_channels as usize;

        for _ in 0..MAX_EMPTY_DECODES {
            let mut call_again = false;
            let samples = decoder.decode(&mut self.decode_buf, &mut call_again);
            let whole = samples - samples % in_ch;

            if whole > 0 {
                let frames = adapt_channels(
                    &self.decode_buf[..whole],
                    self.in_channels,
                    &mut self.fifo,
                    self.out_channels,
                );
                self.fifo_start = 0;
                self.fifo_len = frames * self.out_channels as usize;
                return Refill::Filled;
            }

            if !call_again {
                self.eos = true;
                return Refill::Ended;
            }
        }

        debug!("Decoder stalled after {} empty decodes", MAX_EMPTY_DECODES);
        Refill::Stalled
    }

    /// Whether the decoder has run dry and the converter tail is out
    pub fn is_drained(&self) -> bool {
        self.drained
    }

    /// Discard buffered audio and converter phase (after a seek or rewind)
    pub fn reset(&mut self) {
        self.fifo_start = 0;
        self.fifo_len = 0;
        self.eos = false;
        self.drained = false;
        self.converter.reset();
    }
}
