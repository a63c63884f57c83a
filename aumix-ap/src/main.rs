//! aumix-ap - command-line mixer
//!
//! Plays one or more audio files at the same time through the default (or a
//! named) output device and exits when every stream has finished.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use aumix_ap::audio::{CpalHost, FileSource, Interpolation, SymphoniaDecoder};
use aumix_ap::config::PlayerConfig;
use aumix_ap::playback::{Session, Stream, StreamEventKind};
use aumix_common::time::seconds_to_duration;
use aumix_common::SampleFormat;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often the control loop drains mixer events
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Command-line arguments for aumix-ap
#[derive(Parser, Debug)]
#[command(name = "aumix-ap")]
#[command(about = "Mix and play audio files through the system output")]
#[command(version)]
struct Args {
    /// Audio files to play simultaneously
    #[arg(required_unless_present = "list_devices")]
    files: Vec<PathBuf>,

    /// Config file (overrides AUMIX_CONFIG and the per-user config file)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output sample rate in Hz
    #[arg(short, long, env = "AUMIX_RATE")]
    rate: Option<u32>,

    /// Output sample format (s8, u8, s16le, s16be, u16le, u16be, s32le, f32le)
    #[arg(short, long, env = "AUMIX_FORMAT")]
    format: Option<SampleFormat>,

    /// Output channel count (clamped to 1 or 2)
    #[arg(long, env = "AUMIX_CHANNELS")]
    channels: Option<u16>,

    /// Frames per output callback
    #[arg(short, long, env = "AUMIX_BLOCK")]
    block: Option<usize>,

    /// Output device name
    #[arg(short, long, env = "AUMIX_DEVICE")]
    device: Option<String>,

    /// Resampler used when a file's rate differs from the device (linear, polynomial)
    #[arg(short, long)]
    interpolation: Option<Interpolation>,

    /// Volume for every stream, 0.0 to 1.0
    #[arg(short, long, default_value_t = 1.0)]
    volume: f32,

    /// Fade each stream in over this many seconds
    #[arg(long)]
    fade_in: Option<f64>,

    /// Times to play each file (0 = forever)
    #[arg(short, long, default_value_t = 1)]
    loops: u32,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = PlayerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_ansi(config.logging.ansi))
        .init();

    if args.list_devices {
        for name in CpalHost::list_devices().context("Failed to enumerate output devices")? {
            println!("{}", name);
        }
        return Ok(());
    }

    let session_config = &mut config.session;
    if let Some(rate) = args.rate {
        session_config.sample_rate = rate;
    }
    if let Some(format) = args.format {
        session_config.format = format;
    }
    if let Some(channels) = args.channels {
        session_config.channels = channels;
    }
    if let Some(block) = args.block {
        session_config.block_frames = block;
    }
    if let Some(interpolation) = args.interpolation {
        session_config.interpolation = interpolation;
    }
    if args.device.is_some() {
        session_config.device = args.device.clone();
    }

    info!("Starting aumix-ap with {} file(s)", args.files.len());

    let host = CpalHost::new(config.session.device.clone());
    let mut session = Session::init(host, &config.session).context("Failed to start audio session")?;

    let mut streams = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let source = FileSource::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let stream = Stream::open_with(SymphoniaDecoder::for_path(path), Box::new(source))
            .with_context(|| format!("Failed to decode {}", path.display()))?;

        match stream.duration() {
            Some(seconds) => info!("{}: {:.1}s", path.display(), seconds),
            None => info!("{}: unknown length", path.display()),
        }

        stream.set_volume(args.volume);
        session
            .register(&stream)
            .with_context(|| format!("Failed to register {}", path.display()))?;
        streams.push(stream);
    }

    for stream in &streams {
        let started = match args.fade_in {
            Some(seconds) => stream.fade_in_looped(args.loops, seconds_to_duration(seconds)),
            None => stream.play_looped(args.loops),
        };
        started.context("Failed to start playback")?;
    }

    while streams.iter().any(|s| !s.is_stopped()) {
        thread::sleep(POLL_INTERVAL);
        while let Some(event) = session.next_event() {
            match event.kind {
                StreamEventKind::Finished => info!("{}", event),
                StreamEventKind::Looped => info!("{}", event),
            }
        }
    }

    let stats = session.stats();
    if stats.contended > 0 || stats.dropped_events > 0 {
        warn!(
            "{} contended pulls, {} dropped events",
            stats.contended, stats.dropped_events
        );
    }
    info!(
        "Rendered {} frames in {} callbacks (worst {:?})",
        stats.frames, stats.callbacks, stats.max_callback
    );

    session.quit();
    Ok(())
}
