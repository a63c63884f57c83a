//! Decoder backed by symphonia
//!
//! One [`SymphoniaDecoder`] is constructed per codec. `open` probes the
//! container, rejects a codec that does not match the constructed one, and
//! builds the symphonia codec decoder. Packets are decoded lazily as the
//! mixer pulls samples, and the interleaving buffer is reused between packets.

use crate::audio::decoder::{AudioDecoder, Codec};
use crate::audio::source::ByteSource;
use crate::error::{Error, Result};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{self, CodecType, Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};
use tracing::debug;

/// Exposes a [`ByteSource`] to symphonia's I/O layer
struct SourceAdapter {
    inner: Box<dyn ByteSource>,
}

impl Read for SourceAdapter {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for SourceAdapter {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if !self.inner.can_seek() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "byte source is not seekable",
            ));
        }
        self.inner.seek(pos)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        self.inner.tell()
    }
}

impl MediaSource for SourceAdapter {
    fn is_seekable(&self) -> bool {
        self.inner.can_seek()
    }

    fn byte_len(&self) -> Option<u64> {
        self.inner.size()
    }
}

/// Whether a probed codec type satisfies the constructed codec
fn codec_accepts(codec: Codec, found: CodecType) -> bool {
    match codec {
        Codec::Any => true,
        Codec::Vorbis => found == codecs::CODEC_TYPE_VORBIS,
        Codec::Flac => found == codecs::CODEC_TYPE_FLAC,
        Codec::Mp3 => [
            codecs::CODEC_TYPE_MP1,
            codecs::CODEC_TYPE_MP2,
            codecs::CODEC_TYPE_MP3,
        ]
        .contains(&found),
        Codec::Aac => found == codecs::CODEC_TYPE_AAC,
        Codec::Pcm => [
            codecs::CODEC_TYPE_PCM_S8,
            codecs::CODEC_TYPE_PCM_U8,
            codecs::CODEC_TYPE_PCM_S16LE,
            codecs::CODEC_TYPE_PCM_S16BE,
            codecs::CODEC_TYPE_PCM_U16LE,
            codecs::CODEC_TYPE_PCM_U16BE,
            codecs::CODEC_TYPE_PCM_S24LE,
            codecs::CODEC_TYPE_PCM_S24BE,
            codecs::CODEC_TYPE_PCM_U24LE,
            codecs::CODEC_TYPE_PCM_U24BE,
            codecs::CODEC_TYPE_PCM_S32LE,
            codecs::CODEC_TYPE_PCM_S32BE,
            codecs::CODEC_TYPE_PCM_U32LE,
            codecs::CODEC_TYPE_PCM_U32BE,
            codecs::CODEC_TYPE_PCM_F32LE,
            codecs::CODEC_TYPE_PCM_F32BE,
            codecs::CODEC_TYPE_PCM_F64LE,
            codecs::CODEC_TYPE_PCM_F64BE,
            codecs::CODEC_TYPE_PCM_ALAW,
            codecs::CODEC_TYPE_PCM_MULAW,
        ]
        .contains(&found),
    }
}

/// Everything that exists only while the decoder is open
struct OpenState {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    channels: u16,
    rate: u32,
    n_frames: Option<u64>,
    time_base: Option<TimeBase>,
    sample_buf: Option<SampleBuffer<f32>>,
    pending_pos: usize,
    pending_len: usize,
    /// Frames to discard after an accurate seek landed early
    skip_frames: u64,
    eof: bool,
}

impl OpenState {
    /// Decode the next packet of our track into `sample_buf`.
    ///
    /// Returns false at end of stream or on any error.
    fn decode_next_packet(&mut self) -> bool {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(_) => return false,
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(_) => return false,
            };

            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            if spec.channels.count() != self.channels as usize {
                return false;
            }

            let needed = decoded.capacity() * spec.channels.count();
            let too_small = self
                .sample_buf
                .as_ref()
                .map_or(true, |buf| buf.capacity() < needed);
            if too_small {
                self.sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }
            let Some(buf) = self.sample_buf.as_mut() else {
                return false;
            };
            buf.copy_interleaved_ref(decoded);

            let len = buf.samples().len();
            let channels = self.channels as usize;
            let skip = (self.skip_frames as usize)
                .saturating_mul(channels)
                .min(len);
            self.skip_frames -= (skip / channels) as u64;

            self.pending_pos = skip;
            self.pending_len = len;
            if self.pending_pos < self.pending_len {
                return true;
            }
        }
    }
}

/// Symphonia-backed [`AudioDecoder`]
pub struct SymphoniaDecoder {
    codec: Codec,
    state: Option<OpenState>,
}

impl SymphoniaDecoder {
    pub fn new(codec: Codec) -> Self {
        Self { codec, state: None }
    }

    /// Decoder for whatever codec the file extension suggests
    pub fn for_path(path: &Path) -> Self {
        let codec = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Codec::from_extension)
            .unwrap_or(Codec::Any);
        Self::new(codec)
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn open(&mut self, source: Box<dyn ByteSource>) -> Result<()> {
        if self.state.is_some() {
            return Ok(());
        }

        let adapter = SourceAdapter { inner: source };
        let mss = MediaSourceStream::new(Box::new(adapter), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = self.codec.hint_extension() {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::Open(format!("Failed to probe format: {}", e)))?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Open("No audio track found".to_string()))?;

        let params = track.codec_params.clone();
        let track_id = track.id;

        if !codec_accepts(self.codec, params.codec) {
            return Err(Error::Open(format!(
                "Magic mismatch: stream is not {}",
                self.codec
            )));
        }

        let rate = params
            .sample_rate
            .ok_or_else(|| Error::Open("Sample rate not found".to_string()))?;
        let channel_layout = params
            .channels
            .ok_or_else(|| Error::Open("Channel count not found".to_string()))?;
        let channels = channel_layout.count() as u16;
        if channels == 0 {
            return Err(Error::Open("Stream has no channels".to_string()));
        }

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| Error::Open(format!("Failed to create decoder: {}", e)))?;

        // Size the interleaving buffer up front when the container says how
        // big packets get, so steady-state decoding does not allocate.
        let sample_buf = params.max_frames_per_packet.map(|frames| {
            SampleBuffer::<f32>::new(frames, SignalSpec::new(rate, channel_layout))
        });

        debug!(
            "Opened {} stream: rate={}, channels={}, frames={:?}",
            self.codec, rate, channels, params.n_frames
        );

        self.state = Some(OpenState {
            format,
            decoder,
            track_id,
            channels,
            rate,
            n_frames: params.n_frames,
            time_base: params.time_base,
            sample_buf,
            pending_pos: 0,
            pending_len: 0,
            skip_frames: 0,
            eof: false,
        });
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.is_some()
    }

    fn channels(&self) -> u16 {
        self.state.as_ref().map_or(0, |s| s.channels)
    }

    fn rate(&self) -> u32 {
        self.state.as_ref().map_or(0, |s| s.rate)
    }

    fn decode(&mut self, buf: &mut [f32], call_again: &mut bool) -> usize {
        *call_again = false;
        let Some(state) = self.state.as_mut() else {
            return 0;
        };

        let mut written = 0;
        while written < buf.len() {
            if state.pending_pos < state.pending_len {
                let Some(sample_buf) = state.sample_buf.as_ref() else {
                    break;
                };
                let count = (buf.len() - written).min(state.pending_len - state.pending_pos);
                let start = state.pending_pos;
                buf[written..written + count]
                    .copy_from_slice(&sample_buf.samples()[start..start + count]);
                state.pending_pos += count;
                written += count;
                continue;
            }

            if state.eof {
                break;
            }

            if !state.decode_next_packet() {
                state.eof = true;
                state.pending_pos = 0;
                state.pending_len = 0;
            }
        }

        written
    }

    fn duration(&self) -> Option<f64> {
        let state = self.state.as_ref()?;
        let frames = state.n_frames?;
        if state.rate == 0 {
            return None;
        }
        Some(frames as f64 / state.rate as f64)
    }

    fn seek_to_time(&mut self, seconds: f64) -> Result<()> {
        let state = self.state.as_mut().ok_or(Error::NotOpen)?;

        if !seconds.is_finite() || seconds < 0.0 {
            return Err(Error::Seek(format!("Invalid seek target {}", seconds)));
        }

        let time = Time::new(seconds.trunc() as u64, seconds.fract());
        let seeked = state
            .format
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time,
                    track_id: Some(state.track_id),
                },
            )
            .map_err(|e| Error::Seek(e.to_string()))?;

        state.decoder.reset();

        let early = seeked.required_ts.saturating_sub(seeked.actual_ts);
        state.skip_frames = match state.time_base {
            Some(tb) => {
                let t = tb.calc_time(early);
                ((t.seconds as f64 + t.frac) * state.rate as f64).round() as u64
            }
            None => early,
        };
        state.pending_pos = 0;
        state.pending_len = 0;
        state.eof = false;
        Ok(())
    }
}
