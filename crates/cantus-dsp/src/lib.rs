//! Vocal effects for the live pipeline.
//!
//! - [`Resynthesizer`] / [`PsolaResynthesizer`]: re-render a block along a target pitch curve
//! - [`PitchShifter`]: fixed-interval granular pitch shift
//! - [`VoiceLayeringEffect`]: shifted, delayed doubling voices
//! - [`EffectChain`]: autotune and layering driven by [`SharedSettings`](cantus_core::SharedSettings)

pub mod error;
pub use error::{Error, Result};

mod resynth;
pub use resynth::{PsolaResynthesizer, Resynthesizer};

mod shift;
pub use shift::PitchShifter;

mod layering;
pub use layering::VoiceLayeringEffect;

mod chain;
pub use chain::{ChainStats, ChainStatsSnapshot, EffectChain};
