//! Stream session configuration.

use crate::{Error, Result};
use std::time::Duration;

/// Configuration for a [`StreamEngine`](crate::StreamEngine) session.
///
/// Sample rate, capture block and device selection are inputs from the
/// caller; nothing about the device is hard-coded.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct StreamConfig {
    pub sample_rate: f64,
    /// Hardware callback size in frames. `None` lets the device choose.
    pub capture_block: Option<u32>,
    /// Samples popped from the input ring per processing iteration.
    pub analysis_block: usize,
    /// Capacity of each ring, in seconds of audio.
    pub ring_seconds: f64,
    /// Duplex mode: render processed audio, filling shortfall with raw input.
    pub passthrough: bool,
    /// Keep every processed block for later export. Unbounded, so off by default.
    pub accumulate: bool,
    /// Peak ceiling applied to exported audio.
    pub export_ceiling: f32,
    /// Upper bound on how long `stop()` waits for the worker.
    pub shutdown_timeout: Duration,
    /// Longest the worker parks before re-checking the input ring.
    pub idle_poll: Duration,
    pub input_device: Option<usize>,
    pub output_device: Option<usize>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            capture_block: None,
            analysis_block: 4096,
            ring_seconds: 2.0,
            passthrough: true,
            accumulate: false,
            export_ceiling: 0.8,
            shutdown_timeout: Duration::from_secs(2),
            idle_poll: Duration::from_millis(5),
            input_device: None,
            output_device: None,
        }
    }
}

impl StreamConfig {
    /// Ring capacity in samples.
    pub fn ring_capacity(&self) -> usize {
        (self.sample_rate * self.ring_seconds).ceil() as usize
    }

    pub fn validate(&self) -> Result<()> {
        if !(8000.0..=384000.0).contains(&self.sample_rate) {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        if self.capture_block == Some(0) {
            return Err(Error::InvalidConfig("capture_block must be non-zero".into()));
        }
        if self.analysis_block == 0 {
            return Err(Error::InvalidConfig("analysis_block must be non-zero".into()));
        }
        if !self.ring_seconds.is_finite() || self.ring_seconds <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "ring_seconds {} must be positive",
                self.ring_seconds
            )));
        }
        if self.ring_capacity() < self.analysis_block {
            return Err(Error::InvalidConfig(format!(
                "ring capacity {} cannot hold an analysis block of {}",
                self.ring_capacity(),
                self.analysis_block
            )));
        }
        if !(self.export_ceiling > 0.0 && self.export_ceiling <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "export_ceiling {} out of range (0, 1]",
                self.export_ceiling
            )));
        }
        if self.shutdown_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "shutdown_timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
