//! Test helpers and fixtures for cantus integration tests.
//!
//! Engines are built on the [`ManualBackend`], which runs the duplex callback
//! synchronously, so no test needs audio hardware.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact operations (passthrough, unity gain)
//! - `DSP_EPSILON` (1e-4): DSP processing (resynthesis, interpolation)

#![allow(dead_code)]

pub mod tolerances;

use cantus::analysis::PitchEstimator;
use cantus::prelude::*;
use cantus::AudioBlock;
use std::time::Instant;

pub use tolerances::*;

/// Default test sample rate (matches the default stream config)
pub const TEST_SAMPLE_RATE: f64 = 44100.0;

/// Hardware period used when driving the manual backend
pub const TEST_PERIOD: usize = 512;

/// Engine on a manual backend with default settings, keeping the mix.
pub fn manual_engine(backend: &ManualBackend) -> CantusEngine {
    CantusEngine::builder()
        .sample_rate(TEST_SAMPLE_RATE)
        .accumulate(true)
        .backend(backend.clone())
        .build()
        .expect("Failed to create test engine")
}

/// Generate a test signal: sine wave at given frequency for specified samples.
pub fn generate_sine(frequency: f64, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            (0.5 * (2.0 * std::f64::consts::PI * frequency * t).sin()) as f32
        })
        .collect()
}

pub fn sine_block(frequency: f64, num_samples: usize) -> AudioBlock {
    AudioBlock::new(
        generate_sine(frequency, TEST_SAMPLE_RATE, num_samples),
        TEST_SAMPLE_RATE,
    )
}

/// Generate white noise (samples in -1..1).
pub fn generate_noise(num_samples: usize, seed: u64) -> Vec<f32> {
    // Simple LCG for reproducible "random" noise
    let mut rng = seed;
    (0..num_samples)
        .map(|_| {
            rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((rng >> 32) as f32 / u32::MAX as f32) * 2.0 - 1.0
        })
        .collect()
}

/// Calculate peak amplitude of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}

/// Mean estimated fundamental over the voiced frames of `samples`.
pub fn mean_pitch(samples: &[f32]) -> Option<f32> {
    let block = AudioBlock::new(samples.to_vec(), TEST_SAMPLE_RATE);
    let mut estimator = PitchEstimator::new(TEST_SAMPLE_RATE, AnalysisConfig::default())
        .expect("default analysis config is valid");
    let voiced: Vec<f32> = estimator
        .estimate(&block)
        .iter()
        .filter_map(|p| p.frequency())
        .collect();
    (!voiced.is_empty()).then(|| voiced.iter().sum::<f32>() / voiced.len() as f32)
}

/// Feed `input` through the backend one period at a time, collecting output.
pub fn drive_all(backend: &ManualBackend, input: &[f32]) -> Vec<f32> {
    let mut output = Vec::with_capacity(input.len());
    let mut period = vec![0.0; TEST_PERIOD];
    for chunk in input.chunks(TEST_PERIOD) {
        let out = &mut period[..chunk.len()];
        assert!(backend.drive(chunk, out), "backend not open");
        output.extend_from_slice(out);
    }
    output
}

/// Feed `input` as capture-only periods; nothing is rendered.
pub fn capture_all(backend: &ManualBackend, input: &[f32]) {
    for chunk in input.chunks(TEST_PERIOD) {
        assert!(backend.capture(chunk), "backend not open");
    }
}

/// Poll `cond` until it holds or [`WORKER_WAIT`] elapses.
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WORKER_WAIT;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(std::time::Duration::from_millis(2));
    }
    false
}
