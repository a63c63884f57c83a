//! Frame / duration arithmetic
//!
//! Fades and positions are counted in frames (one sample per channel) at the
//! negotiated device rate. These helpers do the conversion in integer
//! nanoseconds so the same duration always maps to the same frame count.

use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Number of frames covering `duration` at `sample_rate`, rounded to nearest
pub fn duration_to_frames(duration: Duration, sample_rate: u32) -> u64 {
    nanos_to_frames(duration.as_nanos(), sample_rate)
}

/// Number of frames covering `nanos` nanoseconds at `sample_rate`
pub fn nanos_to_frames(nanos: u128, sample_rate: u32) -> u64 {
    let scaled = nanos * sample_rate as u128 + NANOS_PER_SEC / 2;
    (scaled / NANOS_PER_SEC).min(u64::MAX as u128) as u64
}

/// Playback time of `frames` frames at `sample_rate`
pub fn frames_to_duration(frames: u64, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    let nanos = frames as u128 * NANOS_PER_SEC / sample_rate as u128;
    Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
}

/// Duration of `seconds`, treating negative or non-finite input as zero
pub fn seconds_to_duration(seconds: f64) -> Duration {
    if seconds.is_finite() && seconds > 0.0 {
        Duration::from_secs_f64(seconds)
    } else {
        Duration::ZERO
    }
}
