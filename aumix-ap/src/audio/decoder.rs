//! Decoder contract
//!
//! Every codec plugs into the mixer through [`AudioDecoder`]: a pull-based
//! producer of interleaved `f32` samples bound to a [`ByteSource`]. The mixer
//! calls `decode` from the output callback, so implementations must not block
//! on anything slower than their byte source.

use crate::audio::source::ByteSource;
use crate::error::Result;
use std::fmt;

/// Pull-based PCM producer
pub trait AudioDecoder: Send {
    /// Bind to a byte source and read codec headers.
    ///
    /// Calling `open` on an already-open decoder succeeds without touching
    /// the new source.
    fn open(&mut self, source: Box<dyn ByteSource>) -> Result<()>;

    /// Whether `open` has succeeded
    fn is_open(&self) -> bool;

    /// Channel count of the decoded signal (0 until opened)
    fn channels(&self) -> u16;

    /// Native sample rate in Hz (0 until opened)
    fn rate(&self) -> u32;

    /// Decode up to `buf.len()` interleaved samples into `buf`.
    ///
    /// Returns the number of samples written. `call_again` is set when the
    /// result is partial and the caller should call again straight away; a
    /// return of 0 with `call_again` cleared means permanent end of stream
    /// (or a decode error, which is treated the same way). Before `open`
    /// this always returns 0.
    fn decode(&mut self, buf: &mut [f32], call_again: &mut bool) -> usize;

    /// Seek to the start of the stream
    fn rewind(&mut self) -> Result<()> {
        self.seek_to_time(0.0)
    }

    /// Total length in seconds, or `None` if unknown
    fn duration(&self) -> Option<f64>;

    /// Seek to `seconds` from the start.
    ///
    /// Lands on the nearest representable position at or before the target
    /// when the codec cannot seek exactly. Success clears end of stream; on
    /// failure the position is unchanged.
    fn seek_to_time(&mut self, seconds: f64) -> Result<()>;
}

/// Codec a decoder is constructed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    Vorbis,
    Flac,
    Mp3,
    Aac,
    /// Uncompressed PCM in a WAV/AIFF container
    Pcm,
    /// Accept whatever the probe finds
    Any,
}

impl Codec {
    /// Guess a codec from a file extension
    pub fn from_extension(ext: &str) -> Codec {
        match ext.to_ascii_lowercase().as_str() {
            "ogg" | "oga" => Codec::Vorbis,
            "flac" => Codec::Flac,
            "mp3" => Codec::Mp3,
            "aac" | "m4a" | "mp4" => Codec::Aac,
            "wav" | "wave" | "aif" | "aiff" => Codec::Pcm,
            _ => Codec::Any,
        }
    }

    /// Extension hint handed to the format probe
    pub fn hint_extension(&self) -> Option<&'static str> {
        match self {
            Codec::Vorbis => Some("ogg"),
            Codec::Flac => Some("flac"),
            Codec::Mp3 => Some("mp3"),
            Codec::Aac => Some("m4a"),
            Codec::Pcm => Some("wav"),
            Codec::Any => None,
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Codec::Vorbis => "vorbis",
            Codec::Flac => "flac",
            Codec::Mp3 => "mp3",
            Codec::Aac => "aac",
            Codec::Pcm => "pcm",
            Codec::Any => "any",
        };
        f.write_str(name)
    }
}
