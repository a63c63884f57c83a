//! Streams, the stream registry, the mixer and the device session

pub mod callback_monitor;
pub mod events;
pub mod fader;
pub mod mixer;
pub mod pipeline;
pub mod registry;
pub mod session;
pub mod stream;

pub use callback_monitor::{CallbackStats, StatsSnapshot};
pub use events::{StreamEvent, StreamEventKind, StreamId};
pub use mixer::Mixer;
pub use registry::Registry;
pub use session::{session_active, Session};
pub use stream::{PlaybackState, Stream};
