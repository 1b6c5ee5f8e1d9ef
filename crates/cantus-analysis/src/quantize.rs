//! Snapping pitch to the 12-tone equal-tempered scale.

use crate::{Pitch, PitchCurve};

/// Continuous MIDI note number for `freq` (A4 = 440 Hz = 69).
#[inline]
pub fn freq_to_midi(freq: f32) -> f32 {
    69.0 + 12.0 * (freq / 440.0).log2()
}

/// Frequency of a (possibly fractional) MIDI note number.
#[inline]
pub fn midi_to_freq(note: f32) -> f32 {
    440.0 * 2.0f32.powf((note - 69.0) / 12.0)
}

/// Nearest equal-tempered semitone to `freq`.
#[inline]
pub fn snap_to_semitone(freq: f32) -> f32 {
    midi_to_freq(freq_to_midi(freq).round())
}

/// Snap every voiced frame to its nearest semitone. Unvoiced frames pass
/// through unchanged.
pub fn quantize(curve: &PitchCurve) -> PitchCurve {
    curve.map(|pitch| match pitch {
        Pitch::Voiced(freq) => Pitch::voiced(snap_to_semitone(freq)),
        Pitch::Unvoiced => Pitch::Unvoiced,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn curve(frames: Vec<Pitch>) -> PitchCurve {
        PitchCurve::new(frames, 512, 2048)
    }

    #[test]
    fn test_snaps_to_nearest_semitone() {
        assert_relative_eq!(snap_to_semitone(430.0), 440.0, max_relative = 1e-5);
        assert_relative_eq!(snap_to_semitone(452.0), 440.0, max_relative = 1e-5);
        // A#4 is 466.16 Hz; 455 Hz is nearer to it than to A4
        assert_relative_eq!(snap_to_semitone(455.0), 466.1638, max_relative = 1e-4);
        assert_relative_eq!(snap_to_semitone(65.0), 65.406, max_relative = 1e-4);
    }

    #[test]
    fn test_unvoiced_frames_pass_through() {
        let input = curve(vec![Pitch::Unvoiced, Pitch::Voiced(430.0), Pitch::Unvoiced]);
        let output = quantize(&input);

        assert_eq!(output.frames()[0], Pitch::Unvoiced);
        assert_eq!(output.frames()[2], Pitch::Unvoiced);
        assert_relative_eq!(
            output.frames()[1].frequency().unwrap(),
            440.0,
            max_relative = 1e-5
        );
        assert_eq!(output.hop_size(), input.hop_size());
    }

    #[test]
    fn test_all_unvoiced_is_unchanged() {
        let input = PitchCurve::unvoiced(4096, 512, 2048);
        assert_eq!(quantize(&input), input);
    }

    proptest! {
        #[test]
        fn quantize_is_idempotent(freqs in prop::collection::vec(prop::option::of(30.0f32..4000.0), 0..32)) {
            let frames = freqs
                .into_iter()
                .map(|f| f.map_or(Pitch::Unvoiced, Pitch::Voiced))
                .collect();
            let once = quantize(&curve(frames));
            let twice = quantize(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn snapped_frequency_is_within_half_semitone(freq in 30.0f32..4000.0) {
            let snapped = snap_to_semitone(freq);
            let cents = 1200.0 * (snapped / freq).log2();
            prop_assert!(cents.abs() <= 50.01);
        }
    }
}
