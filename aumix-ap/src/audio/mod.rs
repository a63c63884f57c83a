//! Audio I/O: byte sources, decoders, rate conversion and output hosts

pub mod decoder;
pub mod manual;
pub mod output;
pub mod resampler;
pub mod source;
pub mod symphonia_decoder;
pub mod types;

pub use decoder::{AudioDecoder, Codec};
pub use manual::{ManualDriver, ManualHost};
pub use output::{AudioHost, CpalHost, RenderCallback};
pub use resampler::{Interpolation, RateConverter};
pub use source::{ByteSource, FileSource, MemorySource};
pub use symphonia_decoder::SymphoniaDecoder;
pub use types::{adapt_channels, DeviceSpec};
