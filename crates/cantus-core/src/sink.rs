//! Accumulation of processed audio for export.
//!
//! The sink only collects samples; persisting them (WAV, FLAC, ...) is left
//! to the caller.

use crate::{AtomicFlag, Sample};
use parking_lot::Mutex;

/// Append-only store of processed blocks, written by the processing worker.
pub struct AccumulationSink {
    samples: Mutex<Vec<Sample>>,
    enabled: AtomicFlag,
}

impl AccumulationSink {
    pub fn new(enabled: bool) -> Self {
        Self {
            samples: Mutex::new(Vec::new()),
            enabled: AtomicFlag::new(enabled),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    /// Append a processed block. No-op while disabled.
    pub fn append(&self, block: &[Sample]) {
        if self.enabled.get() {
            self.samples.lock().extend_from_slice(block);
        }
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    pub fn clear(&self) {
        self.samples.lock().clear();
    }

    /// Copy of everything accumulated so far, peak-normalized to `ceiling`.
    pub fn export(&self, ceiling: f32) -> Vec<Sample> {
        let mut samples = self.samples.lock().clone();
        normalize_peak(&mut samples, ceiling);
        samples
    }

    /// Take the accumulated samples, leaving the sink empty.
    pub fn take(&self) -> Vec<Sample> {
        std::mem::take(&mut *self.samples.lock())
    }
}

/// Scale `samples` in place so the peak absolute value equals `ceiling`.
///
/// Silent input is left untouched.
pub fn normalize_peak(samples: &mut [Sample], ceiling: f32) {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak <= 0.0 || !peak.is_finite() {
        return;
    }

    let gain = ceiling / peak;
    for sample in samples.iter_mut() {
        *sample *= gain;
    }
}
