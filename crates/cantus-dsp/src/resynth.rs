//! Pitch-synchronous resynthesis (TD-PSOLA).
//!
//! ## Algorithm Overview
//!
//! 1. **Analysis marks**: one mark per source pitch period, snapped to the
//!    waveform peak; fixed 10 ms spacing through unvoiced spans
//! 2. **Synthesis marks**: spaced at the target period where both curves are
//!    voiced, otherwise placed on the analysis marks (identity)
//! 3. **Overlap-add**: a two-period Hann grain from the nearest analysis mark
//!    is added at each synthesis mark, then divided by the summed window
//!
//! Because the output is a window-weighted average of input samples, its
//! peak never exceeds the input peak.

use crate::{Error, Result};
use cantus_analysis::{AnalysisConfig, PitchCurve, PitchEstimator};
use cantus_core::AudioBlock;
use std::f32::consts::PI;

/// Mark rate through unvoiced spans, in Hz.
const UNVOICED_MARK_RATE: f64 = 100.0;

/// Below this summed window weight the input sample is kept as-is.
const MIN_WINDOW_SUM: f32 = 1e-3;

/// Re-renders a block so its pitch follows a target curve.
///
/// Implementations must return a block of the input's length, leave
/// unvoiced spans unmodified, and keep output gain bounded. Failures are
/// reported as errors; callers decide on the fallback.
pub trait Resynthesizer: Send {
    fn resynthesize(
        &mut self,
        block: &AudioBlock,
        target: &PitchCurve,
        min_freq: f32,
        max_freq: f32,
    ) -> Result<AudioBlock>;

    /// Like [`resynthesize`](Self::resynthesize), with the block's own pitch
    /// curve already known. The default ignores `source`.
    fn resynthesize_with_source(
        &mut self,
        block: &AudioBlock,
        source: &PitchCurve,
        target: &PitchCurve,
        min_freq: f32,
        max_freq: f32,
    ) -> Result<AudioBlock> {
        let _ = source;
        self.resynthesize(block, target, min_freq, max_freq)
    }
}

/// TD-PSOLA resynthesizer.
#[derive(Default)]
pub struct PsolaResynthesizer {
    estimator: Option<PitchEstimator>,

    // Reused across blocks
    marks: Vec<usize>,
    out: Vec<f32>,
    wsum: Vec<f32>,
}

impl PsolaResynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn estimator_for(
        &mut self,
        sample_rate: f64,
        config: AnalysisConfig,
    ) -> Result<&mut PitchEstimator> {
        let reusable = self
            .estimator
            .as_ref()
            .is_some_and(|e| e.sample_rate() == sample_rate && *e.config() == config);
        if !reusable {
            self.estimator = Some(PitchEstimator::new(sample_rate, config)?);
        }
        self.estimator
            .as_mut()
            .ok_or_else(|| Error::Degenerate("pitch estimator unavailable".into()))
    }

    fn render(
        &mut self,
        block: &AudioBlock,
        source: &PitchCurve,
        target: &PitchCurve,
        min_freq: f32,
        max_freq: f32,
    ) -> Result<AudioBlock> {
        let x = block.samples();
        let n = x.len();
        let sr = block.sample_rate();

        if n == 0 || target.is_all_unvoiced() || source.is_all_unvoiced() {
            return Ok(block.clone());
        }
        if !block.is_finite() {
            return Err(Error::Degenerate("non-finite input samples".into()));
        }

        let min_period = (sr / f64::from(max_freq)).max(2.0);
        let max_period = (sr / f64::from(min_freq)).max(min_period);
        let unvoiced_period = sr / UNVOICED_MARK_RATE;
        let voiced_period = |pos: usize| {
            source
                .pitch_at(pos)
                .frequency()
                .map(|f| (sr / f64::from(f)).clamp(min_period, max_period))
        };
        let period_at = |pos: usize| voiced_period(pos).unwrap_or(unvoiced_period);

        // Analysis marks, continued one period past the end so the tail is covered
        self.marks.clear();
        let end = n + max_period.ceil() as usize;
        let mut pos = match voiced_period(0) {
            Some(p) => peak_index(x, 0, (p as usize).min(n - 1)),
            None => 0,
        };
        loop {
            self.marks.push(pos);
            if pos >= end {
                break;
            }
            let step = period_at(pos);
            let mut next = pos + step.round() as usize;
            if next < n && voiced_period(next).is_some() {
                let reach = (step / 4.0) as usize;
                let lo = next.saturating_sub(reach).max(pos + (step / 2.0) as usize);
                let hi = (next + reach).min(n - 1);
                if lo <= hi {
                    next = peak_index(x, lo, hi);
                }
            }
            pos = next;
        }

        self.out.clear();
        self.out.resize(n, 0.0);
        self.wsum.clear();
        self.wsum.resize(n, 0.0);

        let marks = &self.marks;
        let out = &mut self.out;
        let wsum = &mut self.wsum;
        let limit = end as f64;
        let mut ts = marks[0] as f64;

        while ts < limit {
            let t = ts.round() as usize;
            let mark = marks[nearest_mark(marks, t)];
            let half = (period_at(mark).round() as usize).max(1);
            overlap_add(x, out, wsum, mark, t, half);

            let shifted = match (source.pitch_at(t).is_voiced(), target.pitch_at(t).frequency()) {
                (true, Some(f)) => Some(sr / f64::from(f.clamp(min_freq, max_freq))),
                _ => None,
            };
            ts = match shifted {
                Some(step) => ts + step,
                None => match marks.get(marks.partition_point(|&m| m <= t)) {
                    Some(&m) => m as f64,
                    None => break,
                },
            };
        }

        let samples: Vec<f32> = x
            .iter()
            .zip(out.iter().zip(wsum.iter()))
            .map(|(&dry, (&acc, &w))| if w > MIN_WINDOW_SUM { acc / w } else { dry })
            .collect();

        if samples.iter().any(|s| !s.is_finite()) {
            return Err(Error::Degenerate("non-finite resynthesis output".into()));
        }
        Ok(block.with_samples(samples))
    }
}

impl Resynthesizer for PsolaResynthesizer {
    fn resynthesize(
        &mut self,
        block: &AudioBlock,
        target: &PitchCurve,
        min_freq: f32,
        max_freq: f32,
    ) -> Result<AudioBlock> {
        check_curve(target, block.len())?;
        if target.is_all_unvoiced() {
            return Ok(block.clone());
        }

        let config = AnalysisConfig {
            min_freq,
            max_freq,
            frame_size: target.frame_size(),
            hop_size: target.hop_size(),
        };
        let source = self.estimator_for(block.sample_rate(), config)?.estimate(block);
        self.render(block, &source, target, min_freq, max_freq)
    }

    fn resynthesize_with_source(
        &mut self,
        block: &AudioBlock,
        source: &PitchCurve,
        target: &PitchCurve,
        min_freq: f32,
        max_freq: f32,
    ) -> Result<AudioBlock> {
        check_curve(source, block.len())?;
        check_curve(target, block.len())?;
        self.render(block, source, target, min_freq, max_freq)
    }
}

/// Frame count must match the block and every voiced frame must be usable.
fn check_curve(curve: &PitchCurve, block_len: usize) -> Result<()> {
    let expected = PitchCurve::frame_count(block_len, curve.hop_size());
    if curve.len() != expected {
        return Err(Error::LengthMismatch {
            expected,
            actual: curve.len(),
        });
    }
    match curve
        .iter()
        .filter_map(|p| p.frequency())
        .find(|f| !f.is_finite() || *f <= 0.0)
    {
        Some(f) => Err(Error::Degenerate(format!("target frequency {f} Hz"))),
        None => Ok(()),
    }
}

/// Index of the largest |x| in `lo..=hi`.
fn peak_index(x: &[f32], lo: usize, hi: usize) -> usize {
    (lo..=hi).fold(lo, |best, i| if x[i].abs() > x[best].abs() { i } else { best })
}

fn nearest_mark(marks: &[usize], t: usize) -> usize {
    let idx = marks.partition_point(|&m| m < t);
    if idx == 0 {
        0
    } else if idx == marks.len() || t - marks[idx - 1] <= marks[idx] - t {
        idx - 1
    } else {
        idx
    }
}

/// Add a Hann grain of `2 * half` samples centered on `src` into `out` at `dst`.
fn overlap_add(x: &[f32], out: &mut [f32], wsum: &mut [f32], src: usize, dst: usize, half: usize) {
    let len = 2 * half;
    for j in 0..len {
        let (Some(s), Some(d)) = ((src + j).checked_sub(half), (dst + j).checked_sub(half)) else {
            continue;
        };
        if s >= x.len() || d >= out.len() {
            continue;
        }
        let w = 0.5 * (1.0 - (2.0 * PI * j as f32 / len as f32).cos());
        out[d] += w * x[s];
        wsum[d] += w;
    }
}
