//! Stream lifecycle notifications
//!
//! The mixer pushes these from the output callback into a pre-allocated
//! `ringbuf` ring; the session drains them on the control context.

use std::fmt;
use uuid::Uuid;

/// Capacity of the callback -> control event ring
pub const EVENT_QUEUE_CAPACITY: usize = 256;

/// Stable identifier of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(Uuid);

impl StreamId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEventKind {
    /// Playback ended on its own (end of stream or a completed fade-out)
    Finished,
    /// End of stream reached and playback restarted from the top
    Looped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamEvent {
    pub id: StreamId,
    pub kind: StreamEventKind,
}

impl fmt::Display for StreamEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            StreamEventKind::Finished => write!(f, "stream {} finished", self.id),
            StreamEventKind::Looped => write!(f, "stream {} looped", self.id),
        }
    }
}
