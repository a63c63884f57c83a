//! Scripted decoders
//!
//! Stand-ins for real codecs whose output is known exactly, so mixed output
//! can be compared sample for sample.

use aumix_ap::audio::{AudioDecoder, ByteSource};
use aumix_ap::error::{Error, Result};

/// Emits one constant value on every channel, optionally for a fixed
/// number of frames before end of stream
pub struct ConstantDecoder {
    value: f32,
    channels: u16,
    rate: u32,
    total_frames: Option<u64>,
    position: u64,
}

impl ConstantDecoder {
    /// Endless stream of `value`
    pub fn new(value: f32, channels: u16, rate: u32) -> Self {
        Self {
            value,
            channels,
            rate,
            total_frames: None,
            position: 0,
        }
    }

    /// `frames` frames of `value`, then end of stream
    pub fn limited(value: f32, channels: u16, rate: u32, frames: u64) -> Self {
        Self {
            total_frames: Some(frames),
            ..Self::new(value, channels, rate)
        }
    }
}

impl AudioDecoder for ConstantDecoder {
    fn open(&mut self, _source: Box<dyn ByteSource>) -> Result<()> {
        Ok(())
    }

    fn is_open(&self) -> bool {
        true
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn rate(&self) -> u32 {
        self.rate
    }

    fn decode(&mut self, buf: &mut [f32], _call_again: &mut bool) -> usize {
        let ch = self.channels as usize;
        let mut frames = (buf.len() / ch) as u64;
        if let Some(total) = self.total_frames {
            frames = frames.min(total - self.position);
        }
        let samples = frames as usize * ch;
        buf[..samples].fill(self.value);
        self.position += frames;
        samples
    }

    fn duration(&self) -> Option<f64> {
        self.total_frames.map(|frames| frames as f64 / self.rate as f64)
    }

    fn seek_to_time(&mut self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(Error::Seek(format!("Cannot seek to {}s", seconds)));
        }
        let frame = (seconds * self.rate as f64) as u64;
        if let Some(total) = self.total_frames {
            if frame > total {
                return Err(Error::Seek(format!("{}s is past the end", seconds)));
            }
        }
        self.position = frame;
        Ok(())
    }
}

/// Decoder whose source can never be opened
pub struct FailingDecoder;

impl AudioDecoder for FailingDecoder {
    fn open(&mut self, _source: Box<dyn ByteSource>) -> Result<()> {
        Err(Error::Open("unrecognised data".to_string()))
    }

    fn is_open(&self) -> bool {
        false
    }

    fn channels(&self) -> u16 {
        0
    }

    fn rate(&self) -> u32 {
        0
    }

    fn decode(&mut self, _buf: &mut [f32], _call_again: &mut bool) -> usize {
        0
    }

    fn duration(&self) -> Option<f64> {
        None
    }

    fn seek_to_time(&mut self, _seconds: f64) -> Result<()> {
        Err(Error::NotOpen)
    }
}

/// Wraps a decoder and answers "nothing yet, call again" a fixed number of
/// times before handing out its data, like a network source still buffering
pub struct StallingDecoder<D> {
    inner: D,
    stalls: u32,
}

impl<D: AudioDecoder> StallingDecoder<D> {
    pub fn new(inner: D, stalls: u32) -> Self {
        Self { inner, stalls }
    }
}

impl<D: AudioDecoder> AudioDecoder for StallingDecoder<D> {
    fn open(&mut self, source: Box<dyn ByteSource>) -> Result<()> {
        self.inner.open(source)
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn rate(&self) -> u32 {
        self.inner.rate()
    }

    fn decode(&mut self, buf: &mut [f32], call_again: &mut bool) -> usize {
        if self.stalls > 0 {
            self.stalls -= 1;
            *call_again = true;
            return 0;
        }
        self.inner.decode(buf, call_again)
    }

    fn duration(&self) -> Option<f64> {
        self.inner.duration()
    }

    fn seek_to_time(&mut self, seconds: f64) -> Result<()> {
        self.inner.seek_to_time(seconds)
    }
}
