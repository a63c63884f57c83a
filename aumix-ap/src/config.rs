//! aumix-ap configuration
//!
//! Loaded from TOML (see [`aumix_common::config`] for how the file is
//! located). Every field has a built-in default, so an empty or missing file
//! is a valid configuration.
//!
//! ```toml
//! [session]
//! sample_rate = 48000
//! format = "f32le"
//! channels = 2
//! block_frames = 512
//! interpolation = "polynomial"
//!
//! [logging]
//! level = "debug"
//! ```

use crate::audio::resampler::Interpolation;
use crate::audio::types::DeviceSpec;
use crate::error::Result;
use aumix_common::config::{load_or_default, resolve_config_path, LoggingConfig, CONFIG_ENV_VAR};
use aumix_common::SampleFormat;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Top-level player configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PlayerConfig {
    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PlayerConfig {
    /// Resolve and load the config file, falling back to defaults.
    ///
    /// `cli_path` beats the `AUMIX_CONFIG` environment variable, which beats
    /// the per-user config file.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let path = resolve_config_path(cli_path, CONFIG_ENV_VAR);
        if let Some(path) = path.as_ref() {
            info!("Using config file {}", path.display());
        }
        Ok(load_or_default(path.as_deref())?)
    }
}

/// Requested output format for a session
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SessionConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_format")]
    pub format: SampleFormat,

    /// Clamped to 1 or 2 when the session starts
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Frames per output callback
    #[serde(default = "default_block_frames")]
    pub block_frames: usize,

    /// Output device name (None = system default)
    #[serde(default)]
    pub device: Option<String>,

    #[serde(default)]
    pub interpolation: Interpolation,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            format: default_format(),
            channels: default_channels(),
            block_frames: default_block_frames(),
            device: None,
            interpolation: Interpolation::default(),
        }
    }
}

impl SessionConfig {
    /// Device format as requested, before clamping or negotiation
    pub fn requested_spec(&self) -> DeviceSpec {
        DeviceSpec {
            sample_rate: self.sample_rate,
            channels: self.channels,
            format: self.format,
            block_frames: self.block_frames,
        }
    }
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_format() -> SampleFormat {
    SampleFormat::S16Le
}

fn default_channels() -> u16 {
    2
}

fn default_block_frames() -> usize {
    1024
}

#[cfg(test)]
mod tests {
    use super::*;
    use aumix_common::config::parse_toml;

    #[test]
    fn test_defaults() {
        let config = PlayerConfig::default();
        assert_eq!(config.session.sample_rate, 44100);
        assert_eq!(config.session.format, SampleFormat::S16Le);
        assert_eq!(config.session.channels, 2);
        assert_eq!(config.session.block_frames, 1024);
        assert_eq!(config.session.device, None);
        assert_eq!(config.session.interpolation, Interpolation::Linear);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_empty_document_is_default() {
        let config: PlayerConfig = parse_toml("").unwrap();
        assert_eq!(config, PlayerConfig::default());
    }

    #[test]
    fn test_partial_session_section() {
        let config: PlayerConfig = parse_toml(
            "[session]\nsample_rate = 48000\nformat = \"f32le\"\ninterpolation = \"polynomial\"\n",
        )
        .unwrap();

        assert_eq!(config.session.sample_rate, 48000);
        assert_eq!(config.session.format, SampleFormat::F32Le);
        assert_eq!(config.session.interpolation, Interpolation::Polynomial);
        assert_eq!(config.session.channels, 2);
    }

    #[test]
    fn test_unknown_format_rejected() {
        let result: aumix_common::Result<PlayerConfig> =
            parse_toml("[session]\nformat = \"s24le\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_requested_spec() {
        let session = SessionConfig {
            channels: 6,
            ..SessionConfig::default()
        };
        let spec = session.requested_spec();
        assert_eq!(spec.channels, 6);
        assert_eq!(spec.block_frames, 1024);
    }
}
