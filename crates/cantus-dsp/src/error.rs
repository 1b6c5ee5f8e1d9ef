//! Error types for cantus-dsp

use thiserror::Error;

/// Effect error type.
///
/// Per-block errors never stop a stream: [`EffectChain`](crate::EffectChain)
/// logs them and passes the block through unmodified.
#[derive(Error, Debug)]
pub enum Error {
    /// Input or output that cannot be processed (non-finite samples or pitch)
    #[error("Degenerate signal: {0}")]
    Degenerate(String),

    /// Pitch curve does not line up with the block
    #[error("Pitch curve has {actual} frames, block needs {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Core(#[from] cantus_core::Error),
}

/// Result type for effect operations
pub type Result<T> = std::result::Result<T, Error>;
