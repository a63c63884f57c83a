//! Output callback statistics
//!
//! Counters are plain atomics written from the callback with relaxed
//! ordering and read from the control context through [`CallbackStats::snapshot`].
//! Recording never logs, locks or allocates.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters shared between the mixer and the session
#[derive(Debug)]
pub struct CallbackStats {
    /// Monotonic origin for interval measurement
    start_time: Instant,

    callbacks: AtomicU64,
    frames: AtomicU64,

    /// Streams skipped because the control context held their pipeline
    contended: AtomicU64,

    /// Events lost because the event ring was full
    dropped_events: AtomicU64,

    /// Longest time spent inside one callback
    max_callback_ns: AtomicU64,

    /// Start of the previous callback, nanoseconds since `start_time`
    last_callback_ns: AtomicU64,

    /// Gap between the two most recent callbacks
    last_interval_ns: AtomicU64,
}

/// Point-in-time copy of [`CallbackStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub callbacks: u64,
    pub frames: u64,
    pub contended: u64,
    pub dropped_events: u64,
    pub max_callback: Duration,
    pub last_interval: Duration,
}

impl CallbackStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            callbacks: AtomicU64::new(0),
            frames: AtomicU64::new(0),
            contended: AtomicU64::new(0),
            dropped_events: AtomicU64::new(0),
            max_callback_ns: AtomicU64::new(0),
            last_callback_ns: AtomicU64::new(0),
            last_interval_ns: AtomicU64::new(0),
        }
    }

    /// Mark the start of a callback; returns the instant to pass to
    /// [`CallbackStats::end_callback`]
    pub fn begin_callback(&self) -> Instant {
        let now = Instant::now();
        let now_ns = now.duration_since(self.start_time).as_nanos() as u64;
        let last_ns = self.last_callback_ns.swap(now_ns, Ordering::Relaxed);
        if self.callbacks.load(Ordering::Relaxed) > 0 {
            self.last_interval_ns
                .store(now_ns.saturating_sub(last_ns), Ordering::Relaxed);
        }
        now
    }

    /// Record a finished callback that rendered `frames` frames
    pub fn end_callback(&self, started: Instant, frames: u64) {
        let elapsed = started.elapsed().as_nanos() as u64;
        self.callbacks.fetch_add(1, Ordering::Relaxed);
        self.frames.fetch_add(frames, Ordering::Relaxed);
        self.max_callback_ns.fetch_max(elapsed, Ordering::Relaxed);
    }

    pub fn record_contention(&self) {
        self.contended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_event(&self) {
        self.dropped_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            callbacks: self.callbacks.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
            contended: self.contended.load(Ordering::Relaxed),
            dropped_events: self.dropped_events.load(Ordering::Relaxed),
            max_callback: Duration::from_nanos(self.max_callback_ns.load(Ordering::Relaxed)),
            last_interval: Duration::from_nanos(self.last_interval_ns.load(Ordering::Relaxed)),
        }
    }
}

impl Default for CallbackStats {
    fn default() -> Self {
        Self::new()
    }
}
