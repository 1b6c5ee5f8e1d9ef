//! Voice layering (doubling) effect.

use crate::PitchShifter;
use cantus_core::AudioBlock;

/// Pitch step between successive layers, in semitones.
const LAYER_STEP_SEMITONES: f32 = 0.5;

/// Delay step between successive layers, in samples.
const LAYER_STEP_DELAY: usize = 200;

/// Adds detuned, delayed copies of a block to itself.
///
/// Layer `i` (1-based) is shifted up `0.5 * i` semitones, delayed `200 * i`
/// samples and scaled by `0.2 / (i + 1)`.
///
/// Each block is processed on its own: delay lines start from silence at
/// every block, so layers restart at block boundaries. This is a known
/// limitation of the effect, audible as a faint click per block on sustained
/// notes.
///
/// Layers are summed without phase alignment, so on signed audio they can
/// partly cancel the dry signal and lower the block's energy.
pub struct VoiceLayeringEffect {
    shifter: PitchShifter,
}

impl VoiceLayeringEffect {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            shifter: PitchShifter::new(sample_rate),
        }
    }

    /// Gain of layer `i`.
    #[inline]
    pub fn layer_gain(layer: usize) -> f32 {
        0.2 / (layer as f32 + 1.0)
    }

    /// `block` plus `num_layers` layers, same length. Zero layers is identity.
    pub fn apply_layers(&self, block: &AudioBlock, num_layers: usize) -> AudioBlock {
        let mut mix = block.samples().to_vec();
        let n = mix.len();

        for layer in 1..=num_layers {
            let delay = layer * LAYER_STEP_DELAY;
            if delay >= n {
                break;
            }
            let shifted = self
                .shifter
                .shift(block, layer as f32 * LAYER_STEP_SEMITONES);
            let gain = Self::layer_gain(layer);

            for (out, &s) in mix[delay..].iter_mut().zip(shifted.samples()) {
                *out += gain * s;
            }
        }

        block.with_samples(mix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SR: f64 = 44100.0;

    #[test]
    fn test_zero_layers_is_identity() {
        let block = AudioBlock::new((0..512).map(|i| (i as f32 * 0.1).sin()).collect(), SR);
        assert_eq!(VoiceLayeringEffect::new(SR).apply_layers(&block, 0), block);
    }

    #[test]
    fn test_layers_start_after_their_delay() {
        let block = AudioBlock::new(vec![0.5; 1024], SR);
        let out = VoiceLayeringEffect::new(SR).apply_layers(&block, 2);

        // Only the dry signal before the first layer's delay
        assert!(out.samples()[..200].iter().all(|&s| s == 0.5));
        assert!(out.samples()[300] > 0.5);
    }

    #[test]
    fn test_deterministic() {
        let effect = VoiceLayeringEffect::new(SR);
        let block = AudioBlock::new((0..2048).map(|i| (i as f32 * 0.05).cos()).collect(), SR);
        assert_eq!(effect.apply_layers(&block, 3), effect.apply_layers(&block, 3));
    }

    #[test]
    fn test_gains() {
        assert!((VoiceLayeringEffect::layer_gain(1) - 0.1).abs() < 1e-7);
        assert!((VoiceLayeringEffect::layer_gain(3) - 0.05).abs() < 1e-7);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        // Non-negative input only: on signed audio layers can partly cancel.
        #[test]
        fn layering_preserves_length_and_adds_energy(
            samples in prop::collection::vec(0.0f32..1.0, 0..3000),
            layers in 0usize..5,
        ) {
            let block = AudioBlock::new(samples, SR);
            let out = VoiceLayeringEffect::new(SR).apply_layers(&block, layers);

            prop_assert_eq!(out.len(), block.len());
            prop_assert!(out.energy() >= block.energy());
        }
    }
}
