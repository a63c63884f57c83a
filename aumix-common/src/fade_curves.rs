//! Fade curve shapes for stream volume ramps
//!
//! A fade maps normalized progress `t` in `[0.0, 1.0]` onto a gain multiplier.
//! Fade-in curves rise from 0.0 to 1.0, fade-out curves fall from 1.0 to 0.0.
//! Progress itself is measured in mixed frames by the caller, never in wall
//! clock time.

use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI};
use std::str::FromStr;

/// Fade curve types
///
/// - Linear: constant rate of change (the default)
/// - Exponential: slow start, fast finish
/// - Logarithmic: fast start, slow finish
/// - SCurve: smooth acceleration and deceleration
/// - EqualPower: constant perceived loudness when two fades overlap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// v(t) = t
    #[default]
    Linear,

    /// v(t) = t²
    Exponential,

    /// v(t) = 1 - (1-t)² on the way in, (1-t)² on the way out
    Logarithmic,

    /// v(t) = 0.5 × (1 - cos(π × t))
    SCurve,

    /// v(t) = sin(t × π/2)
    EqualPower,
}

impl FadeCurve {
    /// Gain for a fade-in at normalized position `t`
    pub fn calculate_fade_in(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => t,
            FadeCurve::Exponential => t * t,
            FadeCurve::Logarithmic => {
                let inv = 1.0 - t;
                1.0 - inv * inv
            }
            FadeCurve::SCurve => 0.5 * (1.0 - (PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
        }
    }

    /// Gain for a fade-out at normalized position `t`
    pub fn calculate_fade_out(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => 1.0 - t,
            FadeCurve::Exponential => {
                let inv = 1.0 - t;
                inv * inv
            }
            FadeCurve::Logarithmic => {
                // Mirror of the exponential fade-in
                1.0 - t * t
            }
            FadeCurve::SCurve => 0.5 * (1.0 + (PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).cos(),
        }
    }

    /// Gain on a ramp from `from` to `to` at normalized position `t`
    ///
    /// Rising ramps use the fade-in shape, falling ramps the fade-out shape,
    /// both rescaled to the `[from, to]` span. The endpoint `t == 1.0` returns
    /// `to` exactly so ramps always land on their target.
    pub fn ramp(&self, from: f32, to: f32, position: f32) -> f32 {
        if position >= 1.0 {
            return to;
        }
        if to >= from {
            from + (to - from) * self.calculate_fade_in(position)
        } else {
            to + (from - to) * self.calculate_fade_out(position)
        }
    }

    /// Compact encoding for lock-free storage in an `AtomicU8`
    pub fn to_u8(self) -> u8 {
        match self {
            FadeCurve::Linear => 0,
            FadeCurve::Exponential => 1,
            FadeCurve::Logarithmic => 2,
            FadeCurve::SCurve => 3,
            FadeCurve::EqualPower => 4,
        }
    }

    /// Inverse of [`FadeCurve::to_u8`]; unknown codes fall back to linear
    pub fn from_u8(code: u8) -> Self {
        match code {
            1 => FadeCurve::Exponential,
            2 => FadeCurve::Logarithmic,
            3 => FadeCurve::SCurve,
            4 => FadeCurve::EqualPower,
            _ => FadeCurve::Linear,
        }
    }

    /// Get human-readable display name
    pub fn display_name(&self) -> &'static str {
        match self {
            FadeCurve::Linear => "Linear",
            FadeCurve::Exponential => "Exponential",
            FadeCurve::Logarithmic => "Logarithmic",
            FadeCurve::SCurve => "S-Curve",
            FadeCurve::EqualPower => "Equal Power",
        }
    }

    /// All available fade curve variants
    pub fn all_variants() -> &'static [FadeCurve] {
        &[
            FadeCurve::Linear,
            FadeCurve::Exponential,
            FadeCurve::Logarithmic,
            FadeCurve::SCurve,
            FadeCurve::EqualPower,
        ]
    }
}

impl FromStr for FadeCurve {
    type Err = crate::Error;

    /// Accepts `linear`, `exponential`, `logarithmic`, `cosine`/`scurve`/
    /// `s-curve`/`s_curve` and `equal_power`/`equalpower`, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(FadeCurve::Linear),
            "exponential" => Ok(FadeCurve::Exponential),
            "logarithmic" => Ok(FadeCurve::Logarithmic),
            "cosine" | "scurve" | "s-curve" | "s_curve" => Ok(FadeCurve::SCurve),
            "equal_power" | "equalpower" => Ok(FadeCurve::EqualPower),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown fade curve '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for FadeCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
