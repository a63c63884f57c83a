//! Device session
//!
//! A [`Session`] negotiates the output format with an [`AudioHost`], builds
//! the mixer for that format and installs it as the host's render callback.
//! Only one session may be active per process; dropping the session tears
//! it down.

use crate::audio::output::AudioHost;
use crate::audio::resampler::Interpolation;
use crate::audio::types::DeviceSpec;
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::playback::callback_monitor::{CallbackStats, StatsSnapshot};
use crate::playback::events::{StreamEvent, EVENT_QUEUE_CAPACITY};
use crate::playback::mixer::Mixer;
use crate::playback::registry::Registry;
use crate::playback::stream::Stream;
use ringbuf::{traits::*, HeapCons, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Set while a session exists anywhere in the process
static SESSION_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Whether a session is currently active in this process
pub fn session_active() -> bool {
    SESSION_ACTIVE.load(Ordering::Acquire)
}

/// Releases the process-wide flag unless disarmed
struct ActiveGuard {
    armed: bool,
}

impl ActiveGuard {
    fn acquire() -> Result<Self> {
        SESSION_ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::SessionActive)?;
        Ok(Self { armed: true })
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        if self.armed {
            SESSION_ACTIVE.store(false, Ordering::Release);
        }
    }
}

/// Clamp a requested channel count to mono or stereo
fn clamp_channels(requested: u16) -> u16 {
    let clamped = requested.clamp(1, 2);
    if clamped != requested {
        warn!(
            "Unsupported channel count {}, using {} instead",
            requested, clamped
        );
    }
    clamped
}

/// Active output session
pub struct Session {
    host: Box<dyn AudioHost>,
    spec: DeviceSpec,
    interpolation: Interpolation,
    registry: Arc<Registry>,
    events: HeapCons<StreamEvent>,
    stats: Arc<CallbackStats>,
    active: bool,
}

impl Session {
    /// Open `host` with the format from `config` and start mixing.
    ///
    /// Fails with [`Error::SessionActive`] if another session exists, or
    /// with the host's error if the device cannot be opened or started.
    pub fn init(host: impl AudioHost + 'static, config: &SessionConfig) -> Result<Self> {
        Self::init_boxed(Box::new(host), config)
    }

    pub fn init_boxed(mut host: Box<dyn AudioHost>, config: &SessionConfig) -> Result<Self> {
        let guard = ActiveGuard::acquire()?;

        let mut requested = config.requested_spec();
        requested.channels = clamp_channels(requested.channels);
        if requested.block_frames == 0 {
            warn!("Block size 0 requested, using 1 frame");
            requested.block_frames = 1;
        }

        info!("Opening {} output: requested {}", host.name(), requested);
        let spec = host.open_device(&requested)?;

        if let Err(e) = Self::validate(&spec) {
            host.close_device();
            return Err(e);
        }
        if spec != requested {
            info!("Device negotiated {}", spec);
        }

        let registry = Arc::new(Registry::new());
        let stats = Arc::new(CallbackStats::new());
        let (producer, consumer) = HeapRb::<StreamEvent>::new(EVENT_QUEUE_CAPACITY).split();
        let mut mixer = Mixer::new(Arc::clone(&registry), spec, producer, Arc::clone(&stats));

        if let Err(e) = host.start(Box::new(move |out: &mut [u8]| mixer.render(out))) {
            host.close_device();
            return Err(e);
        }

        guard.disarm();
        info!("Audio session started: {}", spec);

        Ok(Self {
            host,
            spec,
            interpolation: config.interpolation,
            registry,
            events: consumer,
            stats,
            active: true,
        })
    }

    /// Reject negotiated formats the mixer cannot render
    fn validate(spec: &DeviceSpec) -> Result<()> {
        if !(1..=2).contains(&spec.channels) {
            return Err(Error::DeviceNegotiation(format!(
                "Device granted {} channels",
                spec.channels
            )));
        }
        if spec.sample_rate == 0 {
            return Err(Error::DeviceNegotiation(
                "Device granted a zero sample rate".to_string(),
            ));
        }
        if spec.block_frames == 0 {
            return Err(Error::DeviceNegotiation(
                "Device granted a zero block size".to_string(),
            ));
        }
        Ok(())
    }

    /// Negotiated device format
    pub fn spec(&self) -> DeviceSpec {
        self.spec
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Add `stream` to the mix
    pub fn register(&self, stream: &Stream) -> Result<()> {
        if !self.active {
            return Err(Error::InvalidState("Session has quit".to_string()));
        }
        self.registry.register(stream, &self.spec, self.interpolation)
    }

    /// Remove `stream` from the mix; false if it was not registered here
    pub fn unregister(&self, stream: &Stream) -> bool {
        self.registry.unregister(stream)
    }

    pub fn stream_count(&self) -> usize {
        self.registry.len()
    }

    /// Next lifecycle event reported by the mixer, if any
    pub fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.try_pop()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop every stream, release the device and empty the registry.
    ///
    /// Safe to call more than once; also runs when the session is dropped.
    pub fn quit(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;

        self.registry.stop_all();
        self.host.close_device();
        self.registry.clear();

        let stats = self.stats.snapshot();
        debug!(
            "Session stats: {} callbacks, {} frames, {} contended, {} dropped events",
            stats.callbacks, stats.frames, stats.contended, stats.dropped_events
        );

        SESSION_ACTIVE.store(false, Ordering::Release);
        info!("Audio session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.quit();
    }
}
