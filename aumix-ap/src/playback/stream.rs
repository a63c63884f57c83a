//! Playback streams
//!
//! A [`Stream`] is the application's handle on one decoder. Playback
//! commands are atomics on the shared half of the stream so they never wait
//! on the output callback; the decoder and its pipeline sit behind a mutex
//! that the callback only ever `try_lock`s.
//!
//! State machine:
//! - `play`: Stopped/Paused -> Playing (no-op while Playing)
//! - `pause`: Playing -> Paused
//! - `resume`: Paused -> Playing
//! - `stop`: any -> Stopped, rewinding unless asked not to
//! - `fade_in` / `fade_in_looped`: start Playing with the gain ramping up
//! - `fade_out`: Playing, ramping to silence, then Stopped by the mixer
//!
//! Only the mixer advances fades and makes the automatic transitions (end of
//! stream, completed fade-out). Rewinds the mixer would need are deferred to
//! the next `play`, except when looping.

use crate::audio::decoder::AudioDecoder;
use crate::audio::resampler::Interpolation;
use crate::audio::source::ByteSource;
use crate::audio::types::DeviceSpec;
use crate::error::{Error, Result};
use crate::playback::events::StreamId;
use crate::playback::fader::{Fade, FadeEnd, FadeRequest};
use crate::playback::pipeline::Pipeline;
use crate::playback::registry::Registry;
use aumix_common::FadeCurve;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError, Weak};
use std::time::Duration;
use tracing::{debug, warn};

/// Playback state of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PlaybackState {
    Stopped = 0,
    Playing = 1,
    Paused = 2,
}

impl PlaybackState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => PlaybackState::Playing,
            2 => PlaybackState::Paused,
            _ => PlaybackState::Stopped,
        }
    }
}

/// How a start request treats the loop counter
#[derive(Debug, Clone, Copy)]
enum Repeat {
    /// Play once when starting from Stopped, keep the counter otherwise
    Default,
    /// Additional plays after the current one (`None` = forever)
    Set(Option<u32>),
}

/// State only the holder of the core lock may touch
pub(crate) struct StreamCore {
    decoder: Box<dyn AudioDecoder>,
    /// Device format and interpolation, known once registered
    target: Option<(DeviceSpec, Interpolation)>,
    pipeline: Option<Pipeline>,
    fade: Option<Fade>,
    /// Fade multiplier applied on top of the volume
    fade_level: f32,
    repeats_left: Option<u32>,
    rewind_pending: bool,
}

impl StreamCore {
    fn build_pipeline(&mut self) -> Result<()> {
        if let Some((spec, interpolation)) = self.target {
            if self.decoder.is_open() {
                self.pipeline = Some(Pipeline::new(self.decoder.as_ref(), &spec, interpolation)?);
            }
        }
        Ok(())
    }

    fn rewind(&mut self) -> Result<()> {
        self.decoder.rewind()?;
        if let Some(pipeline) = self.pipeline.as_mut() {
            pipeline.reset();
        }
        self.rewind_pending = false;
        Ok(())
    }
}

/// What happened to one stream during one mix pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MixReport {
    /// Core was locked by the control context; stream contributed silence
    pub contended: bool,
    /// Stream stopped on its own during this pass
    pub finished: bool,
    /// Times the stream restarted from the top
    pub looped: u32,
}

/// Half of a stream shared with the registry and the mixer
pub(crate) struct StreamShared {
    id: StreamId,
    state: AtomicU8,
    /// f32 bits
    volume: AtomicU32,
    muted: AtomicBool,
    /// Encoded [`FadeRequest`], 0 when none is pending
    fade_request: AtomicU64,
    fading: AtomicBool,
    fade_curve: AtomicU8,
    registered: AtomicBool,
    registry: Mutex<Weak<Registry>>,
    core: Mutex<StreamCore>,
}

impl StreamShared {
    pub(crate) fn id(&self) -> StreamId {
        self.id
    }

    fn state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: PlaybackState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn transition(&self, from: PlaybackState, to: PlaybackState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn post(&self, request: FadeRequest) {
        self.fade_request.store(request.encode(), Ordering::Release);
    }

    fn lock_core(&self) -> MutexGuard<'_, StreamCore> {
        self.core.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Bind to a registry's device format and size the pipeline
    pub(crate) fn attach(&self, registry: Weak<Registry>, spec: DeviceSpec, interpolation: Interpolation) -> Result<()> {
        {
            let mut core = self.lock_core();
            core.target = Some((spec, interpolation));
            core.build_pipeline()?;
        }
        *self.registry.lock().unwrap_or_else(|p| p.into_inner()) = registry;
        Ok(())
    }

    pub(crate) fn detach(&self) {
        *self.registry.lock().unwrap_or_else(|p| p.into_inner()) = Weak::new();
        self.registered.store(false, Ordering::Release);
    }

    /// Claim membership; false if already a member of a registry
    pub(crate) fn try_claim(&self) -> bool {
        !self.registered.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn release_claim(&self) {
        self.registered.store(false, Ordering::Release);
    }

    /// Force Stopped, optionally rewinding the decoder
    pub(crate) fn stop(&self, rewind: bool) -> Result<()> {
        self.set_state(PlaybackState::Stopped);
        self.fading.store(false, Ordering::Release);
        self.fade_request.store(0, Ordering::Release);

        let mut core = self.lock_core();
        core.fade = None;
        core.fade_level = 1.0;
        if rewind && core.decoder.is_open() {
            core.rewind()?;
        }
        Ok(())
    }

    /// Mix this stream's next `sum.len() / channels` frames into `sum`.
    ///
    /// Runs on the output callback: no blocking, no allocation, no logging.
    /// `scratch` must be at least as long as `sum`.
    pub(crate) fn mix_into(&self, sum: &mut [f32], scratch: &mut [f32], channels: usize, rate: u32) -> MixReport {
        let mut report = MixReport::default();
        if self.state() != PlaybackState::Playing {
            return report;
        }

        let mut guard = match self.core.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                report.contended = true;
                return report;
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        let core = &mut *guard;

        if let Some(request) = FadeRequest::decode(self.fade_request.swap(0, Ordering::AcqRel)) {
            let curve = FadeCurve::from_u8(self.fade_curve.load(Ordering::Relaxed));
            // A fade replaced mid-way starts from where it had got to
            let current = core.fade.as_ref().map_or(core.fade_level, Fade::level);
            core.fade = Fade::from_request(request, current, rate, curve);
            match request {
                FadeRequest::FadeIn(_) => core.fade_level = 0.0,
                FadeRequest::Reset => core.fade_level = 1.0,
                _ => {}
            }
        }

        let Some(pipeline) = core.pipeline.as_mut() else {
            return report;
        };

        let frames = sum.len() / channels;
        let limit = match &core.fade {
            Some(fade) if fade.ends_playback() => fade.remaining().min(frames as u64) as usize,
            _ => frames,
        };

        let mut pulled = 0;
        let mut ended = false;
        let mut restarted = false;
        while pulled < limit {
            let got = pipeline.pull(
                core.decoder.as_mut(),
                &mut scratch[pulled * channels..limit * channels],
            );
            pulled += got;
            if pulled == limit {
                break;
            }
            if !pipeline.is_drained() {
                // Decoder stalled; the rest of this pass is silence
                break;
            }

            let again = match core.repeats_left {
                None => true,
                Some(0) => false,
                Some(n) => {
                    core.repeats_left = Some(n - 1);
                    true
                }
            };
            // A restart that yields nothing would spin forever
            if !again || (restarted && got == 0) || core.decoder.rewind().is_err() {
                ended = true;
                break;
            }
            pipeline.reset();
            restarted = true;
            report.looped += 1;
        }

        let volume = if self.muted.load(Ordering::Relaxed) {
            0.0
        } else {
            f32::from_bits(self.volume.load(Ordering::Relaxed))
        };
        let samples = &scratch[..pulled * channels];

        match core.fade.as_mut() {
            None => {
                let gain = volume * core.fade_level;
                for (out, sample) in sum.iter_mut().zip(samples) {
                    *out += sample * gain;
                }
            }
            Some(fade) => {
                for (out, frame) in sum.chunks_exact_mut(channels).zip(samples.chunks_exact(channels)) {
                    let gain = fade.next_gain() * volume;
                    for (o, s) in out.iter_mut().zip(frame) {
                        *o += s * gain;
                    }
                }
            }
        }

        if let Some(fade) = core.fade.as_ref().filter(|fade| fade.is_complete()) {
            let end = fade.end();
            core.fade_level = fade.target();
            core.fade = None;
            self.fading.store(false, Ordering::Release);
            match end {
                FadeEnd::Continue => {}
                FadeEnd::Stop => {
                    if self.transition(PlaybackState::Playing, PlaybackState::Stopped) {
                        core.rewind_pending = true;
                        report.finished = true;
                    }
                }
                FadeEnd::Pause => {
                    self.transition(PlaybackState::Playing, PlaybackState::Paused);
                }
            }
        }

        if ended {
            if self.transition(PlaybackState::Playing, PlaybackState::Stopped) {
                report.finished = true;
            }
            core.rewind_pending = true;
            core.fade = None;
            core.fade_level = 1.0;
            self.fading.store(false, Ordering::Release);
        }

        report
    }
}

/// Application handle on one playback stream
///
/// Dropping the handle unregisters the stream.
pub struct Stream {
    shared: Arc<StreamShared>,
}

impl Stream {
    pub fn new(decoder: impl AudioDecoder + 'static) -> Self {
        Self::from_boxed(Box::new(decoder))
    }

    pub fn from_boxed(decoder: Box<dyn AudioDecoder>) -> Self {
        let shared = StreamShared {
            id: StreamId::new(),
            state: AtomicU8::new(PlaybackState::Stopped as u8),
            volume: AtomicU32::new(1.0f32.to_bits()),
            muted: AtomicBool::new(false),
            fade_request: AtomicU64::new(0),
            fading: AtomicBool::new(false),
            fade_curve: AtomicU8::new(FadeCurve::Linear.to_u8()),
            registered: AtomicBool::new(false),
            registry: Mutex::new(Weak::new()),
            core: Mutex::new(StreamCore {
                decoder,
                target: None,
                pipeline: None,
                fade: None,
                fade_level: 1.0,
                repeats_left: Some(0),
                rewind_pending: false,
            }),
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Create a stream and open its decoder on `source`
    pub fn open_with(decoder: impl AudioDecoder + 'static, source: Box<dyn ByteSource>) -> Result<Self> {
        let stream = Self::new(decoder);
        stream.open(source)?;
        Ok(stream)
    }

    pub(crate) fn shared(&self) -> &Arc<StreamShared> {
        &self.shared
    }

    pub fn id(&self) -> StreamId {
        self.shared.id
    }

    /// Open the decoder on `source`; idempotent once open
    pub fn open(&self, source: Box<dyn ByteSource>) -> Result<()> {
        let mut core = self.shared.lock_core();
        if core.decoder.is_open() {
            return Ok(());
        }
        core.decoder.open(source)?;
        core.build_pipeline()?;
        debug!(
            "Stream {} opened: {} ch @ {} Hz",
            self.shared.id,
            core.decoder.channels(),
            core.decoder.rate()
        );
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.shared.lock_core().decoder.is_open()
    }

    fn begin(&self, repeat: Repeat, fade: FadeRequest) -> Result<()> {
        let state = self.state();
        {
            let mut core = self.shared.lock_core();
            if !core.decoder.is_open() {
                return Err(Error::NotOpen);
            }
            if state == PlaybackState::Stopped && core.rewind_pending {
                core.rewind()?;
            }
            match repeat {
                Repeat::Set(repeats) => core.repeats_left = repeats,
                Repeat::Default if state == PlaybackState::Stopped => core.repeats_left = Some(0),
                Repeat::Default => {}
            }
        }

        self.shared
            .fading
            .store(!matches!(fade, FadeRequest::Reset), Ordering::Release);
        self.shared.post(fade);
        self.shared.set_state(PlaybackState::Playing);
        Ok(())
    }

    /// Start playing from the current position (or from the top after the
    /// stream finished). No-op while already playing.
    pub fn play(&self) -> Result<()> {
        if self.is_playing() {
            return Ok(());
        }
        self.begin(Repeat::Default, FadeRequest::Reset)
    }

    /// Play `loops` times in total; 0 loops forever.
    ///
    /// While already playing this only changes how many more times the
    /// stream will restart.
    pub fn play_looped(&self, loops: u32) -> Result<()> {
        let repeats = loops.checked_sub(1);
        if self.is_playing() {
            self.shared.lock_core().repeats_left = repeats;
            return Ok(());
        }
        self.begin(Repeat::Set(repeats), FadeRequest::Reset)
    }

    pub fn pause(&self) {
        self.shared
            .transition(PlaybackState::Playing, PlaybackState::Paused);
    }

    /// Fade to silence over `duration`, then pause
    pub fn pause_with_fade(&self, duration: Duration) {
        if self.is_playing() {
            self.shared.fading.store(true, Ordering::Release);
            self.shared.post(FadeRequest::FadeOutPause(duration));
        }
    }

    pub fn resume(&self) {
        if self.is_paused() {
            self.shared.fading.store(false, Ordering::Release);
            self.shared.post(FadeRequest::Reset);
            self.shared
                .transition(PlaybackState::Paused, PlaybackState::Playing);
        }
    }

    /// Resume from pause, fading in from silence over `duration`
    pub fn resume_with_fade(&self, duration: Duration) {
        if self.is_paused() {
            self.shared.fading.store(true, Ordering::Release);
            self.shared.post(FadeRequest::FadeIn(duration));
            self.shared
                .transition(PlaybackState::Paused, PlaybackState::Playing);
        }
    }

    /// Stop and rewind to the start
    pub fn stop(&self) -> Result<()> {
        self.shared.stop(true)
    }

    /// Stop, keeping the current position for the next `play`
    pub fn stop_without_rewind(&self) {
        // Without a rewind there is nothing that can fail
        let _ = self.shared.stop(false);
    }

    /// Start playing with the gain ramping up from silence over `duration`
    pub fn fade_in(&self, duration: Duration) -> Result<()> {
        self.begin(Repeat::Default, FadeRequest::FadeIn(duration))
    }

    /// [`Stream::play_looped`] and [`Stream::fade_in`] as one command, so the
    /// mixer never sees the stream playing before the ramp is posted
    pub fn fade_in_looped(&self, loops: u32, duration: Duration) -> Result<()> {
        self.begin(Repeat::Set(loops.checked_sub(1)), FadeRequest::FadeIn(duration))
    }

    /// Ramp to silence over `duration`, then stop. Ignored unless playing.
    pub fn fade_out(&self, duration: Duration) {
        if self.is_playing() {
            self.shared.fading.store(true, Ordering::Release);
            self.shared.post(FadeRequest::FadeOutStop(duration));
        }
    }

    /// Set volume, clamped to `[0, 1]`
    pub fn set_volume(&self, volume: f32) {
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self.shared.volume.store(volume.to_bits(), Ordering::Relaxed);
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.shared.volume.load(Ordering::Relaxed))
    }

    pub fn mute(&self) {
        self.shared.muted.store(true, Ordering::Relaxed);
    }

    pub fn unmute(&self) {
        self.shared.muted.store(false, Ordering::Relaxed);
    }

    pub fn is_muted(&self) -> bool {
        self.shared.muted.load(Ordering::Relaxed)
    }

    /// Curve used by fades requested from now on
    pub fn set_fade_curve(&self, curve: FadeCurve) {
        self.shared.fade_curve.store(curve.to_u8(), Ordering::Relaxed);
    }

    pub fn fade_curve(&self) -> FadeCurve {
        FadeCurve::from_u8(self.shared.fade_curve.load(Ordering::Relaxed))
    }

    /// Seek the decoder; on failure the position is unchanged
    pub fn seek_to_time(&self, seconds: f64) -> Result<()> {
        let mut core = self.shared.lock_core();
        if !core.decoder.is_open() {
            return Err(Error::NotOpen);
        }
        core.decoder.seek_to_time(seconds)?;
        if let Some(pipeline) = core.pipeline.as_mut() {
            pipeline.reset();
        }
        core.rewind_pending = false;
        Ok(())
    }

    /// Total length in seconds, if the decoder knows it
    pub fn duration(&self) -> Option<f64> {
        self.shared.lock_core().decoder.duration()
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.state()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.state() == PlaybackState::Paused
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == PlaybackState::Stopped
    }

    pub fn is_fading(&self) -> bool {
        self.shared.fading.load(Ordering::Acquire)
    }

    pub fn is_registered(&self) -> bool {
        self.shared.registered.load(Ordering::Acquire)
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        let registry = self
            .shared
            .registry
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .upgrade();
        if let Some(registry) = registry {
            if !registry.remove(&self.shared) {
                warn!("Stream {} was not in its registry", self.shared.id);
            }
        }
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .field("volume", &self.volume())
            .field("muted", &self.is_muted())
            .finish()
    }
}
