//! Host with no hardware behind it
//!
//! [`ManualHost`] grants a configurable format and hands the render callback
//! to a [`ManualDriver`], which renders blocks only when asked. Tests use it
//! to drive the mixer deterministically from any thread; the player can use
//! it to render offline.

use crate::audio::output::{AudioHost, RenderCallback};
use crate::audio::types::DeviceSpec;
use crate::error::{Error, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

type CallbackSlot = Arc<Mutex<Option<RenderCallback>>>;

fn lock_slot(slot: &CallbackSlot) -> MutexGuard<'_, Option<RenderCallback>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// How the manual host answers `open_device`
#[derive(Debug, Clone)]
enum Grant {
    /// Whatever was requested
    AsRequested,
    /// A fixed spec regardless of the request
    Fixed(DeviceSpec),
    /// Refuse with a negotiation failure
    Refuse(String),
}

/// Hardware-free [`AudioHost`]
pub struct ManualHost {
    grant: Grant,
    slot: CallbackSlot,
    negotiated: Option<DeviceSpec>,
}

impl ManualHost {
    /// Host that grants every request unchanged
    pub fn new() -> Self {
        Self {
            grant: Grant::AsRequested,
            slot: Arc::new(Mutex::new(None)),
            negotiated: None,
        }
    }

    /// Host that always negotiates `spec`, whatever is requested
    pub fn with_spec(spec: DeviceSpec) -> Self {
        Self {
            grant: Grant::Fixed(spec),
            ..Self::new()
        }
    }

    /// Host whose device can never be opened
    pub fn refusing(reason: impl Into<String>) -> Self {
        Self {
            grant: Grant::Refuse(reason.into()),
            ..Self::new()
        }
    }

    /// Handle for rendering blocks once the session has started
    pub fn driver(&self) -> ManualDriver {
        ManualDriver {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl Default for ManualHost {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioHost for ManualHost {
    fn name(&self) -> &str {
        "manual"
    }

    fn open_device(&mut self, requested: &DeviceSpec) -> Result<DeviceSpec> {
        let spec = match &self.grant {
            Grant::AsRequested => *requested,
            Grant::Fixed(spec) => *spec,
            Grant::Refuse(reason) => return Err(Error::DeviceNegotiation(reason.clone())),
        };
        debug!("Manual host granted {}", spec);
        self.negotiated = Some(spec);
        Ok(spec)
    }

    fn start(&mut self, callback: RenderCallback) -> Result<()> {
        if self.negotiated.is_none() {
            return Err(Error::InvalidState("Device not open".to_string()));
        }
        *lock_slot(&self.slot) = Some(callback);
        Ok(())
    }

    fn close_device(&mut self) {
        lock_slot(&self.slot).take();
        self.negotiated = None;
    }
}

/// Renders blocks through a [`ManualHost`]'s installed callback
#[derive(Clone)]
pub struct ManualDriver {
    slot: CallbackSlot,
}

impl ManualDriver {
    /// Fill `out` by invoking the callback once.
    ///
    /// Returns false, leaving `out` untouched, when no callback is installed
    /// (session not started or already closed).
    pub fn render(&self, out: &mut [u8]) -> bool {
        let mut slot = lock_slot(&self.slot);
        match slot.as_mut() {
            Some(callback) => {
                callback(out);
                true
            }
            None => false,
        }
    }

    /// Render `bytes` bytes into a fresh buffer, or `None` if not running
    pub fn render_bytes(&self, bytes: usize) -> Option<Vec<u8>> {
        let mut out = vec![0u8; bytes];
        self.render(&mut out).then_some(out)
    }

    /// Whether a callback is currently installed
    pub fn is_running(&self) -> bool {
        lock_slot(&self.slot).is_some()
    }
}
