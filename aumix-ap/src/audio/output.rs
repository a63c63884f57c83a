//! Audio output hosts
//!
//! An [`AudioHost`] opens an output device, negotiates the format it will
//! actually run at, and then invokes a render callback on its own audio
//! thread, each time asking for a buffer of raw device-format bytes.
//!
//! [`CpalHost`] drives real hardware through cpal's raw-byte stream API.

use crate::audio::types::DeviceSpec;
use crate::error::{Error, Result};
use aumix_common::SampleFormat;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleRate, StreamConfig, SupportedBufferSize};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Callback invoked on the audio thread to fill one output buffer
pub type RenderCallback = Box<dyn FnMut(&mut [u8]) + Send + 'static>;

/// Host device layer
pub trait AudioHost {
    /// Human-readable backend name for logs
    fn name(&self) -> &str;

    /// Open the device with `requested` and return the format actually
    /// granted. The granted format may differ in any field.
    fn open_device(&mut self, requested: &DeviceSpec) -> Result<DeviceSpec>;

    /// Begin invoking `callback` at the device cadence
    fn start(&mut self, callback: RenderCallback) -> Result<()>;

    /// Stop callbacks and release the device. Safe to call more than once.
    fn close_device(&mut self);
}

/// Map a cpal sample format onto a device representation we can render.
///
/// cpal hands out native-endian buffers, so 16-bit formats follow the target
/// endianness and the 32-bit little-endian-only formats are unavailable on
/// big-endian machines.
pub fn map_cpal_format(format: cpal::SampleFormat) -> Option<SampleFormat> {
    let little = cfg!(target_endian = "little");
    match format {
        cpal::SampleFormat::I8 => Some(SampleFormat::S8),
        cpal::SampleFormat::U8 => Some(SampleFormat::U8),
        cpal::SampleFormat::I16 if little => Some(SampleFormat::S16Le),
        cpal::SampleFormat::I16 => Some(SampleFormat::S16Be),
        cpal::SampleFormat::U16 if little => Some(SampleFormat::U16Le),
        cpal::SampleFormat::U16 => Some(SampleFormat::U16Be),
        cpal::SampleFormat::I32 if little => Some(SampleFormat::S32Le),
        cpal::SampleFormat::F32 if little => Some(SampleFormat::F32Le),
        _ => None,
    }
}

/// Output host backed by cpal
pub struct CpalHost {
    requested_device: Option<String>,
    device: Option<Device>,
    config: Option<(StreamConfig, cpal::SampleFormat)>,
    stream: Option<cpal::Stream>,
    /// Set by the stream error callback
    error_flag: Arc<AtomicBool>,
    error_count: Arc<AtomicU32>,
}

impl CpalHost {
    /// Host for the named output device, or the default device for `None`
    pub fn new(device_name: Option<String>) -> Self {
        Self {
            requested_device: device_name,
            device: None,
            config: None,
            stream: None,
            error_flag: Arc::new(AtomicBool::new(false)),
            error_count: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Names of the available output devices
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Whether the stream has reported an error since it started
    pub fn has_error(&self) -> bool {
        self.error_flag.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u32 {
        self.error_count.load(Ordering::Relaxed)
    }

    fn find_device(&self) -> Result<Device> {
        let host = cpal::default_host();

        if let Some(name) = self.requested_device.as_ref() {
            let mut devices = host
                .output_devices()
                .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

            if let Some(device) = devices.find(|d| d.name().ok().as_ref() == Some(name)) {
                info!("Found requested audio device: {}", name);
                return Ok(device);
            }
            warn!(
                "Requested device '{}' not found, falling back to default device",
                name
            );
        }

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?;
        info!(
            "Using default audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );
        Ok(device)
    }

    /// Pick the supported configuration closest to `requested`.
    ///
    /// Only configurations with one or two channels and a renderable sample
    /// format are considered. Rate coverage outranks channel count, which
    /// outranks sample format. Falls back to the device default when nothing
    /// scores.
    fn negotiate(
        device: &Device,
        requested: &DeviceSpec,
    ) -> Result<(StreamConfig, cpal::SampleFormat, DeviceSpec)> {
        let ranges = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?;

        let mut best: Option<(u32, cpal::SupportedStreamConfigRange, SampleFormat)> = None;
        for range in ranges {
            if range.channels() == 0 || range.channels() > 2 {
                continue;
            }
            let Some(format) = map_cpal_format(range.sample_format()) else {
                continue;
            };

            let rate_ok = range.min_sample_rate().0 <= requested.sample_rate
                && range.max_sample_rate().0 >= requested.sample_rate;
            let score = (rate_ok as u32) * 4
                + (range.channels() == requested.channels) as u32 * 2
                + (format == requested.format) as u32;

            if best.as_ref().map_or(true, |(s, _, _)| score > *s) {
                best = Some((score, range, format));
            }
        }

        let (supported, format) = match best {
            Some((_, range, format)) => {
                let rate = requested
                    .sample_rate
                    .clamp(range.min_sample_rate().0, range.max_sample_rate().0);
                (range.with_sample_rate(SampleRate(rate)), format)
            }
            None => {
                let default = device
                    .default_output_config()
                    .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
                let format = map_cpal_format(default.sample_format()).ok_or_else(|| {
                    Error::DeviceNegotiation(format!(
                        "Unsupported device sample format {:?}",
                        default.sample_format()
                    ))
                })?;
                if default.channels() == 0 || default.channels() > 2 {
                    return Err(Error::DeviceNegotiation(format!(
                        "Device only offers {} channels",
                        default.channels()
                    )));
                }
                (default, format)
            }
        };

        let sample_format = supported.sample_format();
        let (buffer_size, block_frames) = choose_buffer_size(supported.buffer_size(), requested.block_frames);

        let mut config = supported.config();
        config.buffer_size = buffer_size;

        let spec = DeviceSpec {
            sample_rate: config.sample_rate.0,
            channels: config.channels,
            format,
            block_frames,
        };
        Ok((config, sample_format, spec))
    }
}

/// Pick the cpal buffer size for a requested block and the block size to
/// report back.
///
/// A block outside the device's range is clamped into it. When the device
/// does not say, cpal picks its own size and the requested block is only a
/// chunking hint for the mixer; callbacks of any length are still filled.
fn choose_buffer_size(supported: &SupportedBufferSize, requested: usize) -> (BufferSize, usize) {
    let requested = requested.max(1);
    match supported {
        SupportedBufferSize::Range { min, max } => {
            let frames = (requested as u32).clamp((*min).max(1), (*max).max(1));
            if frames as usize != requested {
                debug!("Block of {} frames clamped to {} by the device", requested, frames);
            }
            (BufferSize::Fixed(frames), frames as usize)
        }
        SupportedBufferSize::Unknown => {
            debug!("Device buffer size unknown, {} frames is a hint only", requested);
            (BufferSize::Default, requested)
        }
    }
}

impl AudioHost for CpalHost {
    fn name(&self) -> &str {
        "cpal"
    }

    fn open_device(&mut self, requested: &DeviceSpec) -> Result<DeviceSpec> {
        let device = self.find_device()?;
        let (config, sample_format, spec) = Self::negotiate(&device, requested)?;

        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}, buffer_size={:?}",
            config.sample_rate.0, config.channels, sample_format, config.buffer_size
        );

        self.device = Some(device);
        self.config = Some((config, sample_format));
        Ok(spec)
    }

    fn start(&mut self, mut callback: RenderCallback) -> Result<()> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| Error::InvalidState("Device not open".to_string()))?;
        let (config, sample_format) = self
            .config
            .as_ref()
            .ok_or_else(|| Error::InvalidState("Device not open".to_string()))?;

        info!("Starting audio stream");

        let error_flag = Arc::clone(&self.error_flag);
        let error_count = Arc::clone(&self.error_count);

        let stream = device
            .build_output_stream_raw(
                config,
                *sample_format,
                move |data: &mut cpal::Data, _: &cpal::OutputCallbackInfo| {
                    callback(data.bytes_mut());
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                    error_count.fetch_add(1, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        self.stream = Some(stream);
        info!("Audio stream started successfully");
        Ok(())
    }

    fn close_device(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("Failed to pause audio stream: {}", e);
            }
            info!("Audio stream stopped");
        }
        self.config = None;
        self.device = None;
    }
}

impl Drop for CpalHost {
    fn drop(&mut self) {
        self.close_device();
    }
}
