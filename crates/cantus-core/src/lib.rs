//! Streaming runtime for live vocal processing.
//!
//! # Primary API
//!
//! - [`StreamEngine`]: device session lifecycle and the background processing worker
//! - [`SampleRing`]: bounded drop-oldest FIFO shared between the hardware callback and the worker
//! - [`SharedSettings`]: process-wide effect settings, read once per block
//! - [`AudioBackend`]: device seam ([`CpalBackend`] for hardware, [`ManualBackend`] for tests)
//! - [`AccumulationSink`]: processed-audio capture for export
//!
//! # Feature flags
//!
//! - `"device"`: CPAL audio I/O (enabled by default)
//! - `"serialization"`: serde derives on configuration types
//!
//! # Example
//!
//! ```ignore
//! use cantus_core::{ManualBackend, StreamConfig, StreamEngine};
//!
//! let backend = ManualBackend::new();
//! let engine = StreamEngine::new(StreamConfig::default(), Box::new(backend.clone()), processor)?;
//!
//! engine.start()?;
//! backend.drive(&input, &mut output);
//! engine.stop()?;
//! ```

pub mod error;
pub use error::{Error, Result};

mod block;
pub use block::{AudioBlock, Sample};

mod config;
pub use config::StreamConfig;

mod lockfree;
pub use lockfree::{AtomicFlag, AtomicFloat};

mod ring;
pub use ring::SampleRing;

mod settings;
pub use settings::{EffectSettings, SharedSettings};

mod sink;
pub use sink::{normalize_peak, AccumulationSink};

mod callback;
pub use callback::{DeviceErrorReporter, DuplexCallback, InputTap, OutputTap};

pub mod device;
pub use device::{AudioBackend, DeviceHandle, ManualBackend};

#[cfg(feature = "device")]
pub use device::{CpalBackend, DeviceInfo};

mod stream;
pub use stream::{BlockProcessor, EngineState, StatsSnapshot, StreamEngine, StreamStats};
