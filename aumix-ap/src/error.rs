//! Error types for aumix-ap
//!
//! Decoder failures inside the output callback never surface as `Error`
//! values; they degrade the affected stream to end-of-stream. Everything here
//! is reported synchronously to the control context.

use thiserror::Error;

/// Main error type for aumix-ap
#[derive(Error, Debug)]
pub enum Error {
    /// Decoder could not bind to its source (bad header/magic, codec setup)
    #[error("Failed to open audio source: {0}")]
    Open(String),

    /// Operation requires an open decoder
    #[error("Decoder is not open")]
    NotOpen,

    /// Requested position unreachable; playback position is unchanged
    #[error("Seek failed: {0}")]
    Seek(String),

    /// No supported sample representation matched the device
    #[error("Device negotiation failed: {0}")]
    DeviceNegotiation(String),

    /// Audio output device errors (enumeration, stream build/start)
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Another session is already active in this process
    #[error("An audio session is already active")]
    SessionActive,

    /// Stream is already a member of a registry
    #[error("Stream {0} is already registered")]
    AlreadyRegistered(String),

    /// Resampler construction errors
    #[error("Resampler error: {0}")]
    Resampler(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(#[from] aumix_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using aumix-ap Error
pub type Result<T> = std::result::Result<T, Error>;
