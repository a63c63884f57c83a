//! Test helper modules for aumix-ap integration tests
//!
//! - Scripted decoders with known output
//! - WAV fixture generation
//! - Sessions driven by hand through the manual host
//! - Readers for rendered device buffers

#![allow(dead_code)]

pub mod audio_generator;
pub mod decoders;

pub use audio_generator::{constant_wav_bytes, write_constant_wav};
pub use decoders::{ConstantDecoder, FailingDecoder, StallingDecoder};

use aumix_ap::audio::{Interpolation, ManualDriver, ManualHost};
use aumix_ap::config::SessionConfig;
use aumix_ap::playback::{Session, StreamEvent};
use aumix_common::SampleFormat;

/// Start a session on a manual host that grants exactly what is requested
pub fn manual_session(
    sample_rate: u32,
    channels: u16,
    format: SampleFormat,
    block_frames: usize,
) -> (Session, ManualDriver) {
    manual_session_with(SessionConfig {
        sample_rate,
        channels,
        format,
        block_frames,
        ..SessionConfig::default()
    })
}

/// Same as [`manual_session`], resampling with rubato's polynomial interpolator
pub fn polynomial_session(
    sample_rate: u32,
    channels: u16,
    format: SampleFormat,
    block_frames: usize,
) -> (Session, ManualDriver) {
    manual_session_with(SessionConfig {
        sample_rate,
        channels,
        format,
        block_frames,
        interpolation: Interpolation::Polynomial,
        ..SessionConfig::default()
    })
}

pub fn manual_session_with(config: SessionConfig) -> (Session, ManualDriver) {
    let host = ManualHost::new();
    let driver = host.driver();
    let session = Session::init(host, &config).expect("manual session should start");
    (session, driver)
}

/// Render `frames` frames and return the raw device bytes
pub fn render_frames(driver: &ManualDriver, session: &Session, frames: usize) -> Vec<u8> {
    driver
        .render_bytes(frames * session.spec().bytes_per_frame())
        .expect("session should be rendering")
}

pub fn f32le_samples(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

pub fn s16le_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

/// Drain every pending mixer event
pub fn drain_events(session: &mut Session) -> Vec<StreamEvent> {
    std::iter::from_fn(|| session.next_event()).collect()
}
