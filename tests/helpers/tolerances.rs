//! Tolerance constants for audio testing.
//!
//! Different operations require different precision levels.

/// Floating point rounding errors (passthrough, exact gain).
pub const FLOAT_EPSILON: f32 = 1e-6;

/// DSP processing tolerance (resynthesis, interpolation).
pub const DSP_EPSILON: f32 = 1e-4;

/// One equal-tempered semitone as a frequency ratio.
pub const SEMITONE_RATIO: f32 = 1.059_463_1;

/// How long tests wait on the processing worker before failing.
pub const WORKER_WAIT: std::time::Duration = std::time::Duration::from_secs(5);
