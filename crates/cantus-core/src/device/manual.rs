//! Backend driven by the caller instead of audio hardware.
//!
//! Each [`drive`](ManualBackend::drive) call is one hardware period. Used by
//! tests and for feeding pre-recorded audio through a live session.

use super::{AudioBackend, DeviceHandle};
use crate::{AtomicFlag, DuplexCallback, Error, Result, Sample, StreamConfig};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct ManualShared {
    callback: Mutex<Option<DuplexCallback>>,
    fail_next_open: AtomicFlag,
    opens: AtomicUsize,
}

/// Cloneable handle; clones drive the same device.
#[derive(Clone, Default)]
pub struct ManualBackend {
    shared: Arc<ManualShared>,
}

impl ManualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one duplex period. Returns false if no session is open.
    pub fn drive(&self, input: &[Sample], output: &mut [Sample]) -> bool {
        match self.shared.callback.lock().as_mut() {
            Some(callback) => {
                callback.process(input, output);
                true
            }
            None => false,
        }
    }

    /// Run one capture-only period. Returns false if no session is open.
    pub fn capture(&self, input: &[Sample]) -> bool {
        match self.shared.callback.lock().as_mut() {
            Some(callback) => {
                callback.capture(input);
                true
            }
            None => false,
        }
    }

    /// Simulate a device-layer fault (xrun) on the open session.
    pub fn report_device_error(&self, message: &str) -> bool {
        match self.shared.callback.lock().as_ref() {
            Some(callback) => {
                callback.error_reporter().report(message);
                true
            }
            None => false,
        }
    }

    /// Whether a session currently holds the device.
    pub fn is_open(&self) -> bool {
        self.shared.callback.lock().is_some()
    }

    /// Number of successful opens so far.
    pub fn open_count(&self) -> usize {
        self.shared.opens.load(Ordering::Acquire)
    }

    /// Make the next `open` fail, as if the device were unavailable.
    pub fn fail_next_open(&self) {
        self.shared.fail_next_open.set(true);
    }
}

struct ManualStream {
    shared: Arc<ManualShared>,
}

impl Drop for ManualStream {
    fn drop(&mut self) {
        self.shared.callback.lock().take();
    }
}

impl AudioBackend for ManualBackend {
    fn name(&self) -> String {
        "manual".into()
    }

    fn open(&mut self, _config: &StreamConfig, callback: DuplexCallback) -> Result<DeviceHandle> {
        if self.shared.fail_next_open.swap(false) {
            return Err(Error::DeviceOpen("manual device unavailable".into()));
        }

        let mut slot = self.shared.callback.lock();
        if slot.is_some() {
            return Err(Error::InvalidDevice("manual device already open".into()));
        }
        *slot = Some(callback);
        drop(slot);

        self.shared.opens.fetch_add(1, Ordering::AcqRel);
        Ok(DeviceHandle::new(
            "manual",
            ManualStream {
                shared: self.shared.clone(),
            },
        ))
    }
}
