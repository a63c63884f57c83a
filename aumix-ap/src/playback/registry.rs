//! Set of streams the mixer renders
//!
//! Membership changes only on the control context and only splice the list
//! under the lock; the mixer holds the same lock for one block while it
//! iterates. A stream removed here is therefore never referenced by a mix
//! pass in progress, and its last `Arc` is dropped on the control side.

use crate::audio::resampler::Interpolation;
use crate::audio::types::DeviceSpec;
use crate::error::{Error, Result};
use crate::playback::stream::{Stream, StreamShared};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Initial capacity so early registrations do not reallocate under the lock
const INITIAL_CAPACITY: usize = 32;

pub struct Registry {
    streams: Mutex<Vec<Arc<StreamShared>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            streams: Mutex::new(Vec::with_capacity(INITIAL_CAPACITY)),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Vec<Arc<StreamShared>>> {
        self.streams.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add `stream`, preparing its pipeline for `spec`.
    ///
    /// Fails with [`Error::AlreadyRegistered`] if the stream belongs to any
    /// registry already.
    pub fn register(self: &Arc<Self>, stream: &Stream, spec: &DeviceSpec, interpolation: Interpolation) -> Result<()> {
        let shared = stream.shared();
        if !shared.try_claim() {
            return Err(Error::AlreadyRegistered(shared.id().to_string()));
        }

        if let Err(e) = shared.attach(Arc::downgrade(self), *spec, interpolation) {
            shared.release_claim();
            return Err(e);
        }

        let count = {
            let mut streams = self.lock();
            streams.push(Arc::clone(shared));
            streams.len()
        };
        debug!("Registered stream {} ({} active)", shared.id(), count);
        Ok(())
    }

    /// Remove `stream`; returns false if it was not a member
    pub fn unregister(&self, stream: &Stream) -> bool {
        self.remove(stream.shared())
    }

    pub(crate) fn remove(&self, shared: &Arc<StreamShared>) -> bool {
        let removed = {
            let mut streams = self.lock();
            streams
                .iter()
                .position(|s| Arc::ptr_eq(s, shared))
                .map(|index| streams.swap_remove(index))
        };

        match removed {
            Some(stream) => {
                stream.detach();
                debug!("Unregistered stream {}", stream.id());
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, stream: &Stream) -> bool {
        self.lock().iter().any(|s| Arc::ptr_eq(s, stream.shared()))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Force every member to Stopped and rewind it
    pub fn stop_all(&self) {
        let members: Vec<Arc<StreamShared>> = self.lock().clone();
        for stream in members {
            if let Err(e) = stream.stop(true) {
                warn!("Failed to rewind stream {}: {}", stream.id(), e);
            }
        }
    }

    /// Remove every member
    pub fn clear(&self) {
        let drained = std::mem::take(&mut *self.lock());
        if !drained.is_empty() {
            debug!("Clearing {} registered streams", drained.len());
        }
        for stream in &drained {
            stream.detach();
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
