//! End-to-end playback of real encoded files
//!
//! WAV fixtures are written with hound, decoded by symphonia and mixed
//! through a manually driven session.

mod helpers;

use aumix_ap::audio::{Codec, FileSource, MemorySource, SymphoniaDecoder};
use aumix_ap::playback::{Stream, StreamEventKind};
use aumix_common::SampleFormat;
use helpers::*;
use serial_test::serial;
use tempfile::TempDir;

#[test]
#[serial]
fn test_wav_file_plays_to_the_end() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("quarter.wav");
    write_constant_wav(&path, 8000, 1, 400, 8192).unwrap();

    let (mut session, driver) = manual_session(8000, 1, SampleFormat::S16Le, 128);

    let source = FileSource::open(&path).unwrap();
    let stream = Stream::open_with(SymphoniaDecoder::for_path(&path), Box::new(source)).unwrap();
    let duration = stream.duration().unwrap();
    assert!((duration - 0.05).abs() < 1e-3, "duration {}", duration);

    session.register(&stream).unwrap();
    stream.play().unwrap();

    let samples = s16le_samples(&render_frames(&driver, &session, 512));
    assert!(samples[..400].iter().all(|&s| (s - 8192).abs() <= 1));
    assert!(samples[400..].iter().all(|&s| s == 0));
    assert!(stream.is_stopped());

    let events = drain_events(&mut session);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, StreamEventKind::Finished);
}

#[test]
#[serial]
fn test_stereo_wav_downmixed_and_resampled() {
    let bytes = constant_wav_bytes(22050, 2, 4410, -8192);

    let (session, driver) = manual_session(44100, 1, SampleFormat::S16Le, 256);
    let decoder = SymphoniaDecoder::new(Codec::Pcm);
    let stream = Stream::open_with(decoder, Box::new(MemorySource::new(bytes))).unwrap();
    session.register(&stream).unwrap();
    stream.play().unwrap();

    // 0.1 s of source at twice the rate is 8820 frames; stop short of the end
    let samples = s16le_samples(&render_frames(&driver, &session, 8000));
    assert!(samples[..8000].iter().all(|&s| (s + 8192).abs() <= 1));
    assert!(stream.is_playing());
}

#[test]
#[serial]
fn test_seek_then_play_skips_audio() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("one_second.wav");
    write_constant_wav(&path, 8000, 1, 8000, 4096).unwrap();

    let (session, driver) = manual_session(8000, 1, SampleFormat::S16Le, 1024);
    let source = FileSource::open(&path).unwrap();
    let stream = Stream::open_with(SymphoniaDecoder::for_path(&path), Box::new(source)).unwrap();
    session.register(&stream).unwrap();

    stream.seek_to_time(0.75).unwrap();
    assert!(stream.seek_to_time(-1.0).is_err());
    stream.play().unwrap();

    let samples = s16le_samples(&render_frames(&driver, &session, 4096));
    let audible = samples.iter().filter(|&&s| s != 0).count();
    // Last quarter second, give or take one decoder packet boundary
    assert!((audible as i64 - 2000).abs() <= 8, "audible frames {}", audible);
    assert!(stream.is_stopped());
}
