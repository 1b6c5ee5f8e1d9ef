//! The unit of work passed between pipeline stages.

/// Amplitude value, nominally in [-1.0, 1.0]. Not clamped.
pub type Sample = f32;

/// Mono samples at a known sample rate.
///
/// Blocks are transient: one is created per pipeline pass and dropped once
/// its result has been pushed downstream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AudioBlock {
    samples: Vec<Sample>,
    sample_rate: f64,
}

impl AudioBlock {
    pub fn new(samples: Vec<Sample>, sample_rate: f64) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// A block of `len` zero samples.
    pub fn silent(len: usize, sample_rate: f64) -> Self {
        Self::new(vec![0.0; len], sample_rate)
    }

    #[inline]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    #[inline]
    pub fn samples_mut(&mut self) -> &mut [Sample] {
        &mut self.samples
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Build a block with the same sample rate from new samples.
    pub fn with_samples(&self, samples: Vec<Sample>) -> Self {
        Self::new(samples, self.sample_rate)
    }

    /// Peak absolute amplitude (0.0 for an empty block).
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// Sum of squared samples.
    pub fn energy(&self) -> f64 {
        self.samples.iter().map(|&s| (s as f64) * (s as f64)).sum()
    }

    /// Linear crossfade: `strength * other + (1 - strength) * self`.
    ///
    /// `strength` is clamped to [0, 1]. If lengths differ, the shorter length wins.
    pub fn crossfade(&self, other: &AudioBlock, strength: f32) -> Self {
        let strength = strength.clamp(0.0, 1.0);
        let dry = 1.0 - strength;
        self.with_samples(
            self.samples
                .iter()
                .zip(other.samples.iter())
                .map(|(&a, &b)| strength * b + dry * a)
                .collect(),
        )
    }

    /// True if every sample is finite.
    pub fn is_finite(&self) -> bool {
        self.samples.iter().all(|s| s.is_finite())
    }
}
