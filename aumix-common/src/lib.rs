//! # aumix common library
//!
//! Shared building blocks for the aumix playback engine:
//! - Device sample representations and the float → device sample converters
//! - Fade curve definitions
//! - Frame/duration arithmetic
//! - TOML configuration loading and path resolution

pub mod config;
pub mod error;
pub mod fade_curves;
pub mod sample_format;
pub mod time;

pub use error::{Error, Result};
pub use fade_curves::FadeCurve;
pub use sample_format::{SampleConverter, SampleFormat};
