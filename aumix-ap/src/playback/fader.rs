//! Volume fades
//!
//! The control context posts a [`FadeRequest`] through one `AtomicU64`; the
//! mixer picks it up on its next pass over the stream and turns it into a
//! [`Fade`], which it then advances one frame at a time. Fades are timed in
//! mixed frames, never wall clock.
//!
//! A fade of `total` frames hands out gains at progress `1/total`,
//! `2/total`, ..., `total/total`, so the last faded frame is exactly at the
//! target level however the frames are split across callbacks.

use aumix_common::time::nanos_to_frames;
use aumix_common::FadeCurve;
use std::time::Duration;

const KIND_BITS: u32 = 3;
const KIND_MASK: u64 = (1 << KIND_BITS) - 1;
const MAX_FADE_NANOS: u64 = u64::MAX >> KIND_BITS;

const KIND_FADE_IN: u64 = 1;
const KIND_FADE_OUT_STOP: u64 = 2;
const KIND_FADE_OUT_PAUSE: u64 = 3;
const KIND_RESET: u64 = 4;

/// Fade command from the control context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeRequest {
    /// Ramp from silence up to full level
    FadeIn(Duration),
    /// Ramp to silence, then stop
    FadeOutStop(Duration),
    /// Ramp to silence, then pause
    FadeOutPause(Duration),
    /// Drop any fade and jump to full level
    Reset,
}

fn clamp_nanos(duration: Duration) -> u64 {
    duration.as_nanos().min(MAX_FADE_NANOS as u128) as u64
}

impl FadeRequest {
    /// Pack into a non-zero word (0 means "no request")
    pub fn encode(self) -> u64 {
        match self {
            FadeRequest::FadeIn(d) => clamp_nanos(d) << KIND_BITS | KIND_FADE_IN,
            FadeRequest::FadeOutStop(d) => clamp_nanos(d) << KIND_BITS | KIND_FADE_OUT_STOP,
            FadeRequest::FadeOutPause(d) => clamp_nanos(d) << KIND_BITS | KIND_FADE_OUT_PAUSE,
            FadeRequest::Reset => KIND_RESET,
        }
    }

    pub fn decode(word: u64) -> Option<Self> {
        let duration = Duration::from_nanos(word >> KIND_BITS);
        match word & KIND_MASK {
            KIND_FADE_IN => Some(FadeRequest::FadeIn(duration)),
            KIND_FADE_OUT_STOP => Some(FadeRequest::FadeOutStop(duration)),
            KIND_FADE_OUT_PAUSE => Some(FadeRequest::FadeOutPause(duration)),
            KIND_RESET => Some(FadeRequest::Reset),
            _ => None,
        }
    }
}

/// What happens to the stream once a fade lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeEnd {
    /// Keep playing at the target level
    Continue,
    Stop,
    Pause,
}

/// An active fade, advanced by the mixer
#[derive(Debug, Clone)]
pub struct Fade {
    from: f32,
    to: f32,
    total: u64,
    elapsed: u64,
    end: FadeEnd,
    curve: FadeCurve,
}

impl Fade {
    pub fn new(from: f32, to: f32, total_frames: u64, end: FadeEnd, curve: FadeCurve) -> Self {
        Self {
            from,
            to,
            total: total_frames,
            elapsed: 0,
            end,
            curve,
        }
    }

    /// Build a fade for `request` starting at level `current`.
    ///
    /// Returns `None` for [`FadeRequest::Reset`].
    pub fn from_request(
        request: FadeRequest,
        current: f32,
        sample_rate: u32,
        curve: FadeCurve,
    ) -> Option<Self> {
        let frames = |d: Duration| nanos_to_frames(d.as_nanos(), sample_rate);
        match request {
            FadeRequest::FadeIn(d) => Some(Fade::new(0.0, 1.0, frames(d), FadeEnd::Continue, curve)),
            FadeRequest::FadeOutStop(d) => {
                Some(Fade::new(current, 0.0, frames(d), FadeEnd::Stop, curve))
            }
            FadeRequest::FadeOutPause(d) => {
                Some(Fade::new(current, 0.0, frames(d), FadeEnd::Pause, curve))
            }
            FadeRequest::Reset => None,
        }
    }

    /// Gain for the next frame; advances the fade by one frame
    #[inline]
    pub fn next_gain(&mut self) -> f32 {
        if self.elapsed >= self.total {
            return self.to;
        }
        self.elapsed += 1;
        let position = self.elapsed as f64 / self.total as f64;
        self.curve.ramp(self.from, self.to, position as f32)
    }

    /// Gain of the most recently mixed frame (`from` before the first)
    pub fn level(&self) -> f32 {
        match self.elapsed {
            0 => self.from,
            n if n >= self.total => self.to,
            n => self.curve.ramp(self.from, self.to, (n as f64 / self.total as f64) as f32),
        }
    }

    /// Frames left before the target is reached
    pub fn remaining(&self) -> u64 {
        self.total - self.elapsed.min(self.total)
    }

    pub fn is_complete(&self) -> bool {
        self.elapsed >= self.total
    }

    /// Whether the stream must stop producing audio when this fade lands
    pub fn ends_playback(&self) -> bool {
        self.end != FadeEnd::Continue
    }

    pub fn end(&self) -> FadeEnd {
        self.end
    }

    pub fn target(&self) -> f32 {
        self.to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_encoding() {
        let requests = [
            FadeRequest::FadeIn(Duration::from_millis(250)),
            FadeRequest::FadeOutStop(Duration::from_secs(3)),
            FadeRequest::FadeOutPause(Duration::ZERO),
            FadeRequest::Reset,
        ];
        for request in requests {
            let word = request.encode();
            assert_ne!(word, 0);
            assert_eq!(FadeRequest::decode(word), Some(request));
        }
        assert_eq!(FadeRequest::decode(0), None);
    }

    #[test]
    fn test_linear_fade_out_lands_on_zero() {
        let mut fade = Fade::new(1.0, 0.0, 4, FadeEnd::Stop, FadeCurve::Linear);
        let gains: Vec<f32> = (0..4).map(|_| fade.next_gain()).collect();

        assert_eq!(gains, vec![0.75, 0.5, 0.25, 0.0]);
        assert!(fade.is_complete());
        assert_eq!(fade.remaining(), 0);
        assert_eq!(fade.next_gain(), 0.0);
    }

    #[test]
    fn test_fade_in_reaches_one() {
        let mut fade = Fade::new(0.0, 1.0, 3, FadeEnd::Continue, FadeCurve::SCurve);
        let mut last = 0.0;
        for _ in 0..3 {
            let gain = fade.next_gain();
            assert!(gain >= last);
            last = gain;
        }
        assert_eq!(last, 1.0);
        assert!(!fade.ends_playback());
    }

    #[test]
    fn test_level_tracks_last_gain() {
        let mut fade = Fade::new(1.0, 0.0, 4, FadeEnd::Stop, FadeCurve::Linear);
        assert_eq!(fade.level(), 1.0);
        fade.next_gain();
        fade.next_gain();
        assert_eq!(fade.level(), 0.5);
        fade.next_gain();
        fade.next_gain();
        assert_eq!(fade.level(), 0.0);
    }

    #[test]
    fn test_zero_length_fade_is_complete() {
        let fade = Fade::new(1.0, 0.0, 0, FadeEnd::Pause, FadeCurve::Linear);
        assert!(fade.is_complete());
        assert_eq!(fade.remaining(), 0);
        assert!(fade.ends_playback());
    }

    #[test]
    fn test_from_request_uses_device_rate() {
        let fade = Fade::from_request(
            FadeRequest::FadeOutStop(Duration::from_millis(10)),
            0.8,
            44100,
            FadeCurve::Linear,
        )
        .unwrap();
        assert_eq!(fade.remaining(), 441);
        assert_eq!(fade.end(), FadeEnd::Stop);

        assert!(Fade::from_request(FadeRequest::Reset, 1.0, 44100, FadeCurve::Linear).is_none());
    }
}
