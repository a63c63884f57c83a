//! # aumix audio player library (aumix-ap)
//!
//! Real-time mixing of any number of decoded audio streams into one output
//! device callback.
//!
//! **Architecture:** symphonia decoders feed per-stream pipelines (channel
//! adaptation and rate conversion), which the mixer sums inside the cpal
//! output callback. The control side talks to streams through atomics, so
//! the callback never waits on it.
//!
//! ```no_run
//! use aumix_ap::audio::{CpalHost, FileSource, SymphoniaDecoder};
//! use aumix_ap::config::SessionConfig;
//! use aumix_ap::playback::{Session, Stream};
//! use std::path::Path;
//!
//! # fn main() -> aumix_ap::Result<()> {
//! let mut session = Session::init(CpalHost::new(None), &SessionConfig::default())?;
//! let path = Path::new("clip.ogg");
//! let stream = Stream::open_with(SymphoniaDecoder::for_path(path), Box::new(FileSource::open(path)?))?;
//! session.register(&stream)?;
//! stream.play()?;
//! # session.quit();
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod playback;

pub use error::{Error, Result};
