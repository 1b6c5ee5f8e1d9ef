//! Hardware-thread side of a stream session.
//!
//! Everything here runs inside device callbacks: no allocation after the
//! first callback, no logging, and no locks other than the rings' slice copies.

use crate::stream::{StreamStats, WorkerWaker};
use crate::{Sample, SampleRing};
use std::fmt::Display;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Per-callback decay of the held input peak.
const PEAK_DECAY: f32 = 0.995;

/// Capture half: appends device input to the input ring.
pub struct InputTap {
    input: Arc<SampleRing>,
    dry: Option<Arc<SampleRing>>,
    block_len: usize,
    waker: Arc<WorkerWaker>,
    stats: Arc<StreamStats>,
}

impl InputTap {
    pub(crate) fn new(
        input: Arc<SampleRing>,
        dry: Option<Arc<SampleRing>>,
        block_len: usize,
        waker: Arc<WorkerWaker>,
        stats: Arc<StreamStats>,
    ) -> Self {
        Self {
            input,
            dry,
            block_len,
            waker,
            stats,
        }
    }

    /// Queue captured mono samples and wake the worker once a block is ready.
    pub fn capture(&mut self, samples: &[Sample]) {
        let dropped = self.input.push_slice(samples);
        if dropped > 0 {
            self.stats
                .input_overflow
                .fetch_add(dropped as u64, Ordering::Relaxed);
        }

        if let Some(dry) = &self.dry {
            dry.push_slice(samples);
        }

        let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        self.stats.input_peak.hold_peak(peak, PEAK_DECAY);

        if self.input.len() >= self.block_len {
            self.waker.wake();
        }
    }
}

/// Render half: drains processed audio into the device output.
pub struct OutputTap {
    output: Arc<SampleRing>,
    dry: Option<Arc<SampleRing>>,
    stats: Arc<StreamStats>,
    // Grows on first callback, then stable
    scratch: Vec<Sample>,
}

impl OutputTap {
    pub(crate) fn new(
        output: Arc<SampleRing>,
        dry: Option<Arc<SampleRing>>,
        stats: Arc<StreamStats>,
    ) -> Self {
        Self {
            output,
            dry,
            stats,
            scratch: Vec::new(),
        }
    }

    /// Fill `out` with processed samples. Any shortfall is filled with the
    /// raw input captured for the same period, then silence.
    pub fn render(&mut self, out: &mut [Sample]) {
        let needed = out.len();
        let filled = self.output.pop_into(out);

        match &self.dry {
            Some(dry) => {
                if self.scratch.len() < needed {
                    self.scratch.resize(needed, 0.0);
                }
                // Always drain the dry ring so it stays time-aligned with capture
                let dry_len = dry.pop_into(&mut self.scratch[..needed]);
                for (i, sample) in out.iter_mut().enumerate().skip(filled) {
                    *sample = if i < dry_len { self.scratch[i] } else { 0.0 };
                }
            }
            None => out[filled..].fill(0.0),
        }

        if filled < needed {
            self.stats
                .output_underrun
                .fetch_add((needed - filled) as u64, Ordering::Relaxed);
        }
    }
}

/// Counts and logs device-layer faults (xruns, disconnects).
///
/// Used from device error callbacks, which are not the audio data path.
#[derive(Clone)]
pub struct DeviceErrorReporter {
    stats: Arc<StreamStats>,
}

impl DeviceErrorReporter {
    pub fn report(&self, err: impl Display) {
        self.stats.device_errors.fetch_add(1, Ordering::Relaxed);
        tracing::warn!("Audio device error: {}", err);
    }
}

/// Both halves of the hardware side of a session.
///
/// Backends with a single duplex callback call [`process`](Self::process);
/// backends with separate input and output streams [`split`](Self::split) it.
pub struct DuplexCallback {
    input: InputTap,
    output: OutputTap,
    passthrough: bool,
}

impl DuplexCallback {
    pub(crate) fn new(input: InputTap, output: OutputTap, passthrough: bool) -> Self {
        Self {
            input,
            output,
            passthrough,
        }
    }

    /// Whether the session renders output (duplex passthrough mode).
    pub fn passthrough(&self) -> bool {
        self.passthrough
    }

    /// One hardware period: capture `input`, then render into `output`.
    ///
    /// Outside passthrough mode `output` is silenced.
    pub fn process(&mut self, input: &[Sample], output: &mut [Sample]) {
        self.input.capture(input);
        if self.passthrough {
            self.output.render(output);
        } else {
            output.fill(0.0);
        }
    }

    pub fn capture(&mut self, input: &[Sample]) {
        self.input.capture(input);
    }

    pub fn error_reporter(&self) -> DeviceErrorReporter {
        DeviceErrorReporter {
            stats: self.input.stats.clone(),
        }
    }

    pub fn split(self) -> (InputTap, OutputTap) {
        (self.input, self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Fixture = (
        DuplexCallback,
        Arc<SampleRing>,
        Arc<SampleRing>,
        Arc<StreamStats>,
    );

    fn callback(passthrough: bool) -> Fixture {
        let input = Arc::new(SampleRing::new(64));
        let output = Arc::new(SampleRing::new(64));
        let dry = passthrough.then(|| Arc::new(SampleRing::new(64)));
        let stats = Arc::new(StreamStats::default());
        let waker = Arc::new(WorkerWaker::default());

        let cb = DuplexCallback::new(
            InputTap::new(input.clone(), dry.clone(), 4, waker, stats.clone()),
            OutputTap::new(output.clone(), dry, stats.clone()),
            passthrough,
        );
        (cb, input, output, stats)
    }

    #[test]
    fn test_shortfall_falls_back_to_raw_input() {
        let (mut cb, input, output, stats) = callback(true);
        output.push_slice(&[0.9, 0.8]);

        let mut out = [0.0f32; 4];
        cb.process(&[0.1, 0.2, 0.3, 0.4], &mut out);

        assert_eq!(out, [0.9, 0.8, 0.3, 0.4]);
        assert_eq!(input.snapshot(), vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(stats.snapshot().output_underrun, 2);
    }

    #[test]
    fn test_full_output_needs_no_fallback() {
        let (mut cb, _input, output, stats) = callback(true);
        output.push_slice(&[0.5; 4]);

        let mut out = [0.0f32; 4];
        cb.process(&[0.1; 4], &mut out);

        assert_eq!(out, [0.5; 4]);
        assert_eq!(stats.snapshot().output_underrun, 0);
    }

    #[test]
    fn test_capture_only_mode_silences_output() {
        let (mut cb, input, _output, _stats) = callback(false);
        let mut out = [1.0f32; 3];
        cb.process(&[0.1, 0.2, 0.3], &mut out);

        assert_eq!(out, [0.0; 3]);
        assert_eq!(input.len(), 3);
    }

    #[test]
    fn test_input_overflow_is_counted() {
        let (mut cb, input, _output, stats) = callback(false);
        cb.capture(&[0.0; 70]);

        assert_eq!(input.len(), 64);
        assert_eq!(stats.snapshot().input_overflow, 6);
    }
}
