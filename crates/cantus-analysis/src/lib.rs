//! Pitch analysis for live vocal processing.
//!
//! ```ignore
//! use cantus_analysis::{quantize, AnalysisConfig, PitchEstimator};
//!
//! let mut estimator = PitchEstimator::new(44100.0, AnalysisConfig::default())?;
//! let curve = estimator.estimate(&block);
//! let target = quantize(&curve);
//! ```

mod curve;
mod pitch;
mod quantize;

pub use curve::{midi_to_note_name, Pitch, PitchCurve};
pub use pitch::{estimate, AnalysisConfig, PitchEstimator};
pub use quantize::{freq_to_midi, midi_to_freq, quantize, snap_to_semitone};
