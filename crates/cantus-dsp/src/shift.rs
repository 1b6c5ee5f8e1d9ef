//! Granular pitch shifting.
//!
//! Each output grain reads the input around its own center at a scaled rate,
//! so pitch moves by the ratio while timing stays anchored. Hann grains at
//! 50% overlap sum to unity, so no normalization pass is needed.

use cantus_core::{AudioBlock, Sample};
use std::f32::consts::PI;

/// Grain length in milliseconds.
const GRAIN_MS: f64 = 25.0;

/// Fixed-interval pitch shifter for whole blocks.
pub struct PitchShifter {
    hop_size: usize,
    window: Vec<f32>,
}

impl PitchShifter {
    pub fn new(sample_rate: f64) -> Self {
        let size = ((sample_rate * GRAIN_MS / 1000.0) as usize).max(4) & !1;
        let hop = size / 2;

        // Periodic Hann: overlapping at `hop` sums to exactly 1
        let window = (0..size)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
            .collect();

        Self {
            hop_size: hop,
            window,
        }
    }

    /// `block` shifted by `semitones`, same length. Reads outside the block
    /// are silence.
    pub fn shift(&self, block: &AudioBlock, semitones: f32) -> AudioBlock {
        if semitones == 0.0 || block.is_empty() {
            return block.clone();
        }

        let ratio = 2.0f32.powf(semitones / 12.0);
        let x = block.samples();
        let n = x.len();
        let half = self.hop_size;
        let mut out = vec![0.0; n];

        // Grain k covers [k*hop - half, k*hop + half)
        let mut center = 0usize;
        while center < n + half {
            for (j, &w) in self.window.iter().enumerate() {
                let Some(dst) = (center + j).checked_sub(half) else {
                    continue;
                };
                if dst >= n {
                    break;
                }
                let offset = j as f32 - half as f32;
                out[dst] += w * read(x, center as f32 + offset * ratio);
            }
            center += self.hop_size;
        }

        block.with_samples(out)
    }
}

/// Linear interpolation, zero outside the slice.
#[inline]
fn read(x: &[Sample], pos: f32) -> Sample {
    if pos < 0.0 {
        return 0.0;
    }
    let i = pos as usize;
    let frac = pos - i as f32;
    let a = x.get(i).copied().unwrap_or(0.0);
    let b = x.get(i + 1).copied().unwrap_or(0.0);
    a + (b - a) * frac
}
