//! Device session lifecycle tests
//!
//! Covers format negotiation, the one-session-per-process rule, teardown,
//! and registry safety while the callback runs on another thread.

mod helpers;

use aumix_ap::audio::{DeviceSpec, ManualHost};
use aumix_ap::config::SessionConfig;
use aumix_ap::error::Error;
use aumix_ap::playback::{session_active, Session, Stream};
use aumix_common::SampleFormat;
use helpers::*;
use serial_test::serial;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
#[serial]
fn test_negotiated_spec_is_reported() {
    let granted = DeviceSpec {
        sample_rate: 48000,
        channels: 2,
        format: SampleFormat::F32Le,
        block_frames: 480,
    };
    let host = ManualHost::with_spec(granted);
    let driver = host.driver();

    let session = Session::init(host, &SessionConfig::default()).unwrap();
    assert!(session.is_active());
    assert!(session_active());
    assert_eq!(session.spec(), granted);
    assert!(driver.is_running());

    // Streams are prepared for the granted format, not the requested one
    let stream = Stream::new(ConstantDecoder::new(0.25, 2, 48000));
    session.register(&stream).unwrap();
    stream.play().unwrap();
    let samples = f32le_samples(&render_frames(&driver, &session, 480));
    assert!(samples.iter().all(|&s| s == 0.25));
}

#[test]
#[serial]
fn test_refused_device_releases_the_session_flag() {
    let result = Session::init(ManualHost::refusing("no output device"), &SessionConfig::default());
    assert!(matches!(result, Err(Error::DeviceNegotiation(_))));
    assert!(!session_active());

    let (session, _driver) = manual_session(44100, 2, SampleFormat::S16Le, 256);
    assert!(session.is_active());
}

#[test]
#[serial]
fn test_unusable_grant_is_rejected() {
    let surround = DeviceSpec {
        sample_rate: 48000,
        channels: 6,
        format: SampleFormat::S16Le,
        block_frames: 512,
    };
    let host = ManualHost::with_spec(surround);
    let driver = host.driver();

    let result = Session::init(host, &SessionConfig::default());
    assert!(matches!(result, Err(Error::DeviceNegotiation(_))));
    assert!(!driver.is_running());
    assert!(!session_active());
}

#[test]
#[serial]
fn test_requested_channels_are_clamped() {
    let config = SessionConfig {
        channels: 6,
        ..SessionConfig::default()
    };
    let session = Session::init(ManualHost::new(), &config).unwrap();
    assert_eq!(session.spec().channels, 2);
    drop(session);

    let config = SessionConfig {
        channels: 0,
        ..SessionConfig::default()
    };
    let session = Session::init(ManualHost::new(), &config).unwrap();
    assert_eq!(session.spec().channels, 1);
}

#[test]
#[serial]
fn test_only_one_session_at_a_time() {
    let (mut first, _driver) = manual_session(44100, 2, SampleFormat::S16Le, 256);

    let second = Session::init(ManualHost::new(), &SessionConfig::default());
    assert!(matches!(second, Err(Error::SessionActive)));
    assert!(first.is_active());

    first.quit();
    let third = Session::init(ManualHost::new(), &SessionConfig::default());
    assert!(third.is_ok());
}

#[test]
#[serial]
fn test_quit_is_idempotent_and_tears_down() {
    let (mut session, driver) = manual_session(8000, 1, SampleFormat::S16Le, 64);

    let stream = Stream::new(ConstantDecoder::new(0.5, 1, 8000));
    session.register(&stream).unwrap();
    stream.play().unwrap();
    assert_eq!(session.stream_count(), 1);

    session.quit();
    assert!(!session.is_active());
    assert!(!session_active());
    assert!(!driver.is_running());
    assert!(driver.render_bytes(128).is_none());
    assert!(stream.is_stopped());
    assert!(!stream.is_registered());
    assert_eq!(session.stream_count(), 0);

    session.quit();
    assert!(!session_active());

    assert!(matches!(session.register(&stream), Err(Error::InvalidState(_))));
}

#[test]
#[serial]
fn test_stream_moves_between_sessions() {
    let stream = Stream::new(ConstantDecoder::new(0.5, 1, 16000));

    {
        let (session, driver) = manual_session(8000, 1, SampleFormat::S16Le, 64);
        session.register(&stream).unwrap();
        stream.play().unwrap();
        let samples = s16le_samples(&render_frames(&driver, &session, 64));
        assert!(samples.iter().all(|&s| s == 16384));
    }
    assert!(!stream.is_registered());

    // New device rate, new pipeline
    let (session, driver) = manual_session(16000, 1, SampleFormat::S16Le, 64);
    session.register(&stream).unwrap();
    stream.play().unwrap();
    let samples = s16le_samples(&render_frames(&driver, &session, 64));
    assert!(samples.iter().all(|&s| s == 16384));
}

#[test]
#[serial]
fn test_double_registration_rejected() {
    let (session, _driver) = manual_session(8000, 1, SampleFormat::S16Le, 64);
    let stream = Stream::new(ConstantDecoder::new(0.5, 1, 8000));

    session.register(&stream).unwrap();
    assert!(matches!(session.register(&stream), Err(Error::AlreadyRegistered(_))));
    assert_eq!(session.stream_count(), 1);

    assert!(session.unregister(&stream));
    assert!(!session.unregister(&stream));
    assert_eq!(session.stream_count(), 0);
}

#[test]
#[serial]
fn test_concurrent_registration_while_rendering() {
    let (mut session, driver) = manual_session(44100, 2, SampleFormat::S16Le, 128);
    let bytes = 128 * session.spec().bytes_per_frame();

    let stop = Arc::new(AtomicBool::new(false));
    let renderer = {
        let driver = driver.clone();
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut buf = vec![0u8; bytes];
            let mut callbacks = 0u64;
            while !stop.load(Ordering::Acquire) {
                assert!(driver.render(&mut buf));
                callbacks += 1;
                thread::sleep(Duration::from_micros(100));
            }
            callbacks
        })
    };

    let mut live: Vec<Stream> = Vec::new();
    for i in 0..400u32 {
        // Mix of native-rate and resampled streams, some short enough to end
        let rate = if i % 2 == 0 { 44100 } else { 22050 };
        let stream = Stream::new(ConstantDecoder::limited(0.01, 2, rate, 64 + (i as u64 % 5) * 300));
        session.register(&stream).unwrap();
        stream.play().unwrap();

        match i % 4 {
            0 => {
                session.unregister(&stream);
            }
            1 => stream.fade_out(Duration::from_millis(2)),
            2 => stream.set_volume(0.5),
            _ => {}
        }
        live.push(stream);

        if live.len() > 16 {
            // Dropping a handle unregisters it
            live.remove(0);
        }
        let _ = drain_events(&mut session);
    }

    live.clear();
    assert_eq!(session.stream_count(), 0);

    stop.store(true, Ordering::Release);
    let callbacks = renderer.join().unwrap();
    assert!(callbacks > 0);
    assert_eq!(session.stats().callbacks, callbacks);
}
