//! Audio device seam.
//!
//! The engine hands a [`DuplexCallback`] to an [`AudioBackend`] and keeps the
//! returned [`DeviceHandle`] for the session. Dropping the handle closes the
//! device.

use crate::{DuplexCallback, Result, StreamConfig};

mod manual;
pub use manual::ManualBackend;

#[cfg(feature = "device")]
mod cpal;
#[cfg(feature = "device")]
pub use self::cpal::{CpalBackend, DeviceInfo};

/// Something that can open mono capture (and optionally playback) streams.
pub trait AudioBackend: Send {
    /// Human-readable backend name, for logs.
    fn name(&self) -> String;

    /// Open the device and start delivering callbacks into `callback`.
    ///
    /// Output is only expected when `callback.passthrough()` is true.
    fn open(&mut self, config: &StreamConfig, callback: DuplexCallback) -> Result<DeviceHandle>;
}

/// Open device streams. Dropping or [`close`](Self::close)-ing stops them.
pub struct DeviceHandle {
    name: String,
    _streams: Box<dyn Send>,
}

impl DeviceHandle {
    pub fn new(name: impl Into<String>, streams: impl Send + 'static) -> Self {
        Self {
            name: name.into(),
            _streams: Box::new(streams),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn close(self) {
        tracing::debug!("Closing audio device '{}'", self.name);
    }
}
