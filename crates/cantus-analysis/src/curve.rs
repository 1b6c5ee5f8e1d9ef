//! Per-frame pitch estimates.

use crate::quantize::freq_to_midi;

/// Pitch of one analysis frame.
///
/// There is no numeric stand-in for "no pitch": callers match on the variant.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum Pitch {
    Unvoiced,
    /// Fundamental frequency in Hz, always finite and positive.
    Voiced(f32),
}

impl Pitch {
    /// Voiced pitch at `freq`, or `Unvoiced` for zero, negative or non-finite input.
    pub fn voiced(freq: f32) -> Self {
        if freq.is_finite() && freq > 0.0 {
            Self::Voiced(freq)
        } else {
            Self::Unvoiced
        }
    }

    pub fn is_voiced(&self) -> bool {
        matches!(self, Self::Voiced(_))
    }

    pub fn frequency(&self) -> Option<f32> {
        match *self {
            Self::Voiced(freq) => Some(freq),
            Self::Unvoiced => None,
        }
    }

    /// Nearest note name with sharp notation (e.g., "A4", "C#5").
    pub fn note_name(&self) -> Option<String> {
        self.frequency()
            .map(|freq| midi_to_note_name(freq_to_midi(freq).round() as i32))
    }
}

/// Note name for a MIDI note number, sharp notation.
pub fn midi_to_note_name(note: i32) -> String {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    let name = NAMES[note.rem_euclid(12) as usize];
    let octave = note.div_euclid(12) - 1;
    format!("{}{}", name, octave)
}

/// Frame-wise pitch track aligned to one audio block.
///
/// Frame `k` is centered on sample `k * hop_size`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct PitchCurve {
    frames: Vec<Pitch>,
    hop_size: usize,
    frame_size: usize,
}

impl PitchCurve {
    pub fn new(frames: Vec<Pitch>, hop_size: usize, frame_size: usize) -> Self {
        Self {
            frames,
            hop_size: hop_size.max(1),
            frame_size,
        }
    }

    /// Number of frames covering `block_len` samples at `hop_size`.
    pub fn frame_count(block_len: usize, hop_size: usize) -> usize {
        block_len / hop_size.max(1) + 1
    }

    /// All-unvoiced curve covering `block_len` samples.
    pub fn unvoiced(block_len: usize, hop_size: usize, frame_size: usize) -> Self {
        let count = Self::frame_count(block_len, hop_size);
        Self::new(vec![Pitch::Unvoiced; count], hop_size, frame_size)
    }

    pub fn frames(&self) -> &[Pitch] {
        &self.frames
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pitch> {
        self.frames.iter()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Pitch of the frame nearest to `sample`.
    pub fn pitch_at(&self, sample: usize) -> Pitch {
        if self.frames.is_empty() {
            return Pitch::Unvoiced;
        }
        let index = (sample + self.hop_size / 2) / self.hop_size;
        self.frames[index.min(self.frames.len() - 1)]
    }

    pub fn voiced_count(&self) -> usize {
        self.frames.iter().filter(|p| p.is_voiced()).count()
    }

    pub fn is_all_unvoiced(&self) -> bool {
        self.voiced_count() == 0
    }

    /// Same framing, each frame passed through `f`.
    pub fn map(&self, f: impl Fn(Pitch) -> Pitch) -> Self {
        Self {
            frames: self.frames.iter().map(|&p| f(p)).collect(),
            hop_size: self.hop_size,
            frame_size: self.frame_size,
        }
    }
}
