//! Error types for cantus-core.

use std::time::Duration;
use thiserror::Error;

/// Error type for cantus-core operations.
///
/// Only session boundaries (configuration, `start`, `stop`) surface errors.
/// Faults inside the hardware callback or the processing worker are counted
/// in [`StreamStats`](crate::StreamStats) and logged instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid device: {0}")]
    InvalidDevice(String),

    #[cfg(feature = "device")]
    #[error("Audio device not available")]
    DeviceNotAvailable(#[from] cpal::DefaultStreamConfigError),

    #[cfg(feature = "device")]
    #[error("Failed to build audio stream")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[cfg(feature = "device")]
    #[error("Failed to play audio stream")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[cfg(feature = "device")]
    #[error("Failed to enumerate devices")]
    DevicesError(#[from] cpal::DevicesError),

    #[cfg(feature = "device")]
    #[error("Failed to get device name")]
    DeviceNameError(#[from] cpal::DeviceNameError),

    #[error("Device open failed: {0}")]
    DeviceOpen(String),

    #[error("Failed to spawn processing worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),

    #[error("Processing worker did not confirm launch")]
    WorkerLaunch,

    #[error("Processing worker did not exit within {waited:?}; resources released anyway")]
    ShutdownTimeout { waited: Duration },
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
