//! Pitch tracking using the YIN algorithm.
//!
//! YIN (de Cheveigné & Kawahara, 2002) picks the first dip of the cumulative
//! mean normalized difference function below a threshold, which avoids the
//! octave errors of plain autocorrelation peak picking.
//!
//! 1. **Difference function** - d(τ) = Σ(x[j] - x[j+τ])²
//! 2. **Cumulative mean normalized difference** - d'(τ)
//! 3. **Absolute threshold** - first τ where d'(τ) < threshold
//! 4. **Parabolic interpolation** - sub-sample accuracy

use crate::{Pitch, PitchCurve};
use cantus_core::{normalize_peak, AudioBlock, Error, Result};

/// YIN threshold (lower = stricter).
const YIN_THRESHOLD: f32 = 0.1;

/// Global-minimum fallback is only trusted below this aperiodicity.
const FALLBACK_APERIODICITY: f32 = 0.35;

/// Frames quieter than this (after block normalization) are unvoiced.
const SILENCE_RMS: f64 = 1e-3;

/// Pitch search range and framing.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct AnalysisConfig {
    pub min_freq: f32,
    pub max_freq: f32,
    pub frame_size: usize,
    pub hop_size: usize,
}

impl Default for AnalysisConfig {
    /// C2 to C7, 2048-sample frames with 75% overlap.
    fn default() -> Self {
        Self {
            min_freq: 65.406,
            max_freq: 2093.005,
            frame_size: 2048,
            hop_size: 512,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self, sample_rate: f64) -> Result<()> {
        if !(self.min_freq.is_finite() && self.max_freq.is_finite())
            || self.min_freq <= 0.0
            || self.min_freq >= self.max_freq
        {
            return Err(Error::InvalidConfig(format!(
                "pitch range {}-{} Hz is invalid",
                self.min_freq, self.max_freq
            )));
        }
        if f64::from(self.max_freq) >= sample_rate / 2.0 {
            return Err(Error::InvalidConfig(format!(
                "max_freq {} Hz must be below Nyquist ({} Hz)",
                self.max_freq,
                sample_rate / 2.0
            )));
        }
        if self.hop_size == 0 || self.hop_size > self.frame_size {
            return Err(Error::InvalidConfig(format!(
                "hop_size {} must be in 1..={}",
                self.hop_size, self.frame_size
            )));
        }
        let max_period = (sample_rate / f64::from(self.min_freq)).ceil() as usize;
        if self.frame_size < max_period * 2 {
            return Err(Error::InvalidConfig(format!(
                "frame_size {} cannot hold two periods of {} Hz ({} samples)",
                self.frame_size,
                self.min_freq,
                max_period * 2
            )));
        }
        Ok(())
    }
}

/// Block-level pitch tracker.
///
/// Owns its scratch buffers, so one estimator should live on the processing
/// thread and be reused for every block.
pub struct PitchEstimator {
    sample_rate: f64,
    config: AnalysisConfig,

    // Pre-allocated buffers
    normalized: Vec<f32>,
    difference: Vec<f32>,
    cumulative_mean: Vec<f32>,
    cum_sq: Vec<f64>,
}

impl PitchEstimator {
    pub fn new(sample_rate: f64, config: AnalysisConfig) -> Result<Self> {
        config.validate(sample_rate)?;
        let max_period = (sample_rate / f64::from(config.min_freq)) as usize;

        Ok(Self {
            sample_rate,
            config,
            normalized: Vec::new(),
            difference: vec![0.0; max_period + 1],
            cumulative_mean: vec![0.0; max_period + 1],
            cum_sq: vec![0.0; config.frame_size + 1],
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Pitch curve for `block`, one frame per hop.
    ///
    /// Blocks shorter than one frame yield an all-unvoiced curve. The block is
    /// peak-normalized on a private copy; `block` itself is never modified.
    pub fn estimate(&mut self, block: &AudioBlock) -> PitchCurve {
        let AnalysisConfig {
            frame_size,
            hop_size,
            ..
        } = self.config;
        let len = block.len();

        if len < frame_size {
            return PitchCurve::unvoiced(len, hop_size, frame_size);
        }

        let mut normalized = std::mem::take(&mut self.normalized);
        normalized.clear();
        normalized.extend_from_slice(block.samples());
        normalize_peak(&mut normalized, 1.0);

        let count = PitchCurve::frame_count(len, hop_size);
        let frames = (0..count)
            .map(|k| {
                let start = (k * hop_size)
                    .saturating_sub(frame_size / 2)
                    .min(len - frame_size);
                self.detect(&normalized[start..start + frame_size])
            })
            .collect();

        self.normalized = normalized;
        PitchCurve::new(frames, hop_size, frame_size)
    }

    /// Pitch of a single frame.
    fn detect(&mut self, frame: &[f32]) -> Pitch {
        if frame.iter().any(|s| !s.is_finite()) {
            return Pitch::Unvoiced;
        }

        let min_period = (self.sample_rate / f64::from(self.config.max_freq)) as usize;
        let max_period = ((self.sample_rate / f64::from(self.config.min_freq)) as usize)
            .min(frame.len() / 2)
            .min(self.difference.len() - 1);

        if max_period <= min_period.max(1) {
            return Pitch::Unvoiced;
        }

        self.compute_energy(frame);
        let rms = ((self.cum_sq[frame.len()]) / frame.len() as f64).sqrt();
        if rms < SILENCE_RMS {
            return Pitch::Unvoiced;
        }

        self.compute_difference(frame, max_period);
        self.compute_cumulative_mean(max_period);

        let Some(period) = self.find_best_period(min_period.max(1), max_period) else {
            return Pitch::Unvoiced;
        };

        let refined = self.parabolic_interpolation(period, max_period);
        let frequency = (self.sample_rate / refined) as f32;

        if frequency < self.config.min_freq || frequency > self.config.max_freq {
            return Pitch::Unvoiced;
        }
        Pitch::voiced(frequency)
    }

    fn compute_energy(&mut self, frame: &[f32]) {
        if self.cum_sq.len() < frame.len() + 1 {
            self.cum_sq.resize(frame.len() + 1, 0.0);
        }
        self.cum_sq[0] = 0.0;
        for (i, &s) in frame.iter().enumerate() {
            self.cum_sq[i + 1] = self.cum_sq[i] + f64::from(s) * f64::from(s);
        }
    }

    /// d(τ) = energy(0, W) + energy(τ, W) - 2 * autocorr(τ), W = max_period.
    fn compute_difference(&mut self, frame: &[f32], max_period: usize) {
        let window = max_period;
        let cum_sq = &self.cum_sq;
        let energy = |start: usize| cum_sq[start + window] - cum_sq[start];
        let e0 = energy(0);

        self.difference[0] = 0.0;
        for tau in 1..=max_period {
            let autocorr: f64 = frame[..window]
                .iter()
                .zip(&frame[tau..tau + window])
                .map(|(&a, &b)| f64::from(a) * f64::from(b))
                .sum();
            self.difference[tau] = (e0 + energy(tau) - 2.0 * autocorr).max(0.0) as f32;
        }
    }

    /// d'(τ) = d(τ) / ((1/τ) * Σ d(j)), d'(0) = 1.
    fn compute_cumulative_mean(&mut self, max_period: usize) {
        self.cumulative_mean[0] = 1.0;

        let mut running_sum = 0.0f32;
        for tau in 1..=max_period {
            running_sum += self.difference[tau];
            self.cumulative_mean[tau] = if running_sum > 1e-10 {
                self.difference[tau] * tau as f32 / running_sum
            } else {
                1.0
            };
        }
    }

    /// First local minimum below threshold, else a trusted global minimum.
    fn find_best_period(&self, min_period: usize, max_period: usize) -> Option<usize> {
        let cmnd = &self.cumulative_mean;
        let mut tau = min_period;

        while tau < max_period {
            if cmnd[tau] < YIN_THRESHOLD {
                while tau + 1 < max_period && cmnd[tau + 1] < cmnd[tau] {
                    tau += 1;
                }
                return Some(tau);
            }
            tau += 1;
        }

        let (best_tau, best_val) = (min_period..=max_period)
            .map(|tau| (tau, cmnd[tau]))
            .fold((min_period, f32::MAX), |best, cur| {
                if cur.1 < best.1 {
                    cur
                } else {
                    best
                }
            });

        (best_val < FALLBACK_APERIODICITY).then_some(best_tau)
    }

    fn parabolic_interpolation(&self, tau: usize, max_period: usize) -> f64 {
        if tau < 1 || tau >= max_period {
            return tau as f64;
        }

        let s0 = f64::from(self.cumulative_mean[tau - 1]);
        let s1 = f64::from(self.cumulative_mean[tau]);
        let s2 = f64::from(self.cumulative_mean[tau + 1]);

        let denominator = 2.0 * (2.0 * s1 - s2 - s0);
        if denominator.abs() > 1e-10 {
            tau as f64 + ((s2 - s0) / denominator).clamp(-1.0, 1.0)
        } else {
            tau as f64
        }
    }
}

/// One-shot estimation with explicit parameters.
///
/// Invalid parameters yield an all-unvoiced curve rather than an error.
pub fn estimate(
    block: &AudioBlock,
    sample_rate: f64,
    min_freq: f32,
    max_freq: f32,
    frame_size: usize,
    hop_size: usize,
) -> PitchCurve {
    let config = AnalysisConfig {
        min_freq,
        max_freq,
        frame_size,
        hop_size,
    };
    match PitchEstimator::new(sample_rate, config) {
        Ok(mut estimator) => estimator.estimate(block),
        Err(_) => PitchCurve::unvoiced(block.len(), hop_size, frame_size),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::TAU;

    const SR: f64 = 44100.0;

    fn sine(freq: f32, len: usize, amplitude: f32) -> AudioBlock {
        let samples = (0..len)
            .map(|i| amplitude * (TAU * freq * i as f32 / SR as f32).sin())
            .collect();
        AudioBlock::new(samples, SR)
    }

    fn estimator() -> PitchEstimator {
        PitchEstimator::new(SR, AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn test_detects_a440() {
        let curve = estimator().estimate(&sine(440.0, 4096, 0.8));

        assert_eq!(curve.len(), 9);
        for pitch in curve.iter() {
            let freq = pitch.frequency().expect("sine should be voiced");
            assert_relative_eq!(freq, 440.0, max_relative = 0.01);
        }
    }

    #[test]
    fn test_level_invariant() {
        let mut est = estimator();
        let loud = est.estimate(&sine(220.0, 4096, 0.9));
        let quiet = est.estimate(&sine(220.0, 4096, 0.01));

        for (a, b) in loud.iter().zip(quiet.iter()) {
            assert_relative_eq!(
                a.frequency().unwrap(),
                b.frequency().unwrap(),
                max_relative = 1e-3
            );
        }
    }

    #[test]
    fn test_short_block_is_unvoiced() {
        let curve = estimator().estimate(&sine(440.0, 1000, 0.8));
        assert!(curve.is_all_unvoiced());
        assert_eq!(curve.len(), PitchCurve::frame_count(1000, 512));
    }

    #[test]
    fn test_silence_is_unvoiced() {
        let curve = estimator().estimate(&AudioBlock::silent(4096, SR));
        assert!(curve.is_all_unvoiced());
    }

    #[test]
    fn test_block_is_not_modified() {
        let block = sine(330.0, 4096, 0.25);
        let before = block.clone();
        estimator().estimate(&block);
        assert_eq!(block, before);
    }

    #[test]
    fn test_config_validation() {
        let bad_range = AnalysisConfig {
            min_freq: 500.0,
            max_freq: 100.0,
            ..Default::default()
        };
        assert!(bad_range.validate(SR).is_err());

        let small_frame = AnalysisConfig {
            frame_size: 512,
            hop_size: 128,
            ..Default::default()
        };
        assert!(small_frame.validate(SR).is_err());

        assert!(AnalysisConfig::default().validate(SR).is_ok());
    }

    #[test]
    fn test_free_function_matches_estimator() {
        let block = sine(196.0, 4096, 0.5);
        let a = estimate(&block, SR, 65.406, 2093.005, 2048, 512);
        let b = estimator().estimate(&block);
        assert_eq!(a, b);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn short_blocks_never_voiced(len in 0usize..2048) {
                let block = sine(440.0, len, 0.5);
                let curve = estimator().estimate(&block);
                prop_assert!(curve.is_all_unvoiced());
            }
        }
    }
}
