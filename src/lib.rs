//! # Cantus - Live Vocal Processing
//!
//! Real-time autotune and voice layering over a duplex audio stream.
//!
//! ## Architecture
//!
//! Cantus is an umbrella crate that coordinates:
//! - **cantus-core** - Streaming runtime (sample rings, device I/O, processing worker, settings)
//! - **cantus-analysis** - Pitch tracking (YIN) and semitone quantization
//! - **cantus-dsp** - Effects (PSOLA pitch correction, granular shifting, layering, effect chain)
//!
//! The hardware callback only moves samples between rings. All analysis and
//! resynthesis runs on one background worker, block by block, and falls back
//! to the dry signal whenever it cannot keep up or a block cannot be corrected.
//!
//! ## Quick Start
//!
//! ```ignore
//! use cantus::prelude::*;
//!
//! let engine = CantusEngine::builder()
//!     .sample_rate(44100.0)
//!     .strength(0.8)
//!     .accumulate(true)
//!     .build()?;
//!
//! engine.start()?;
//!
//! // From the gesture or UI thread
//! let control = engine.control();
//! control.on_gesture(Gesture::from_label("open palm"));
//!
//! engine.stop()?;
//! let mix = engine.export_mix();
//! ```
//!
//! ## Feature Flags
//!
//! - `device` - CPAL audio I/O (default)
//! - `serialization` - serde derives on configuration types

/// Re-export of cantus-core for direct access
pub use cantus_core as core;

/// Re-export of cantus-analysis for direct access
pub use cantus_analysis as analysis;

/// Re-export of cantus-dsp for direct access
pub use cantus_dsp as dsp;

pub use cantus_core::{
    AudioBackend, AudioBlock, EffectSettings, EngineState, ManualBackend, Sample, SharedSettings,
    StatsSnapshot, StreamConfig,
};

#[cfg(feature = "device")]
pub use cantus_core::{CpalBackend, DeviceInfo};

pub use cantus_analysis::{AnalysisConfig, Pitch, PitchCurve};
pub use cantus_dsp::ChainStatsSnapshot;

mod error;
pub use error::{Error, Result};

mod builder;
pub use builder::CantusEngineBuilder;

mod engine;
pub use engine::CantusEngine;

mod control;
pub use control::{ControlEvent, ControlSurface, Gesture};

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        AnalysisConfig, CantusEngine, CantusEngineBuilder, ControlEvent, ControlSurface,
        EffectSettings, EngineState, Gesture, ManualBackend, Result, StreamConfig,
    };
}
