//! Builder for configuring and constructing a `CantusEngine`.

use crate::{CantusEngine, ControlSurface, Result};
use cantus_analysis::AnalysisConfig;
use cantus_core::{
    AudioBackend, EffectSettings, Error as CoreError, SharedSettings, StreamConfig, StreamEngine,
};
use cantus_dsp::EffectChain;
use std::sync::Arc;
use std::time::Duration;

/// Sample rate, block sizes and devices are all caller inputs; nothing about
/// the hardware is assumed beyond the defaults below.
///
/// # Example
///
/// ```ignore
/// use cantus::prelude::*;
///
/// let engine = CantusEngine::builder()
///     .sample_rate(48000.0)
///     .analysis_block(4096)
///     .layers(3)
///     .build()?;
///
/// let control = engine.control();
/// engine.start()?;
/// control.on_gesture(Gesture::OpenPalm);
/// ```
#[derive(Default)]
pub struct CantusEngineBuilder {
    stream: StreamConfig,
    analysis: AnalysisConfig,
    effects: EffectSettings,
    settings: Option<Arc<SharedSettings>>,
    backend: Option<Box<dyn AudioBackend>>,
}

impl CantusEngineBuilder {
    /// Default: 44100
    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.stream.sample_rate = sample_rate;
        self
    }

    /// Fixed hardware period in frames. Default: device-chosen.
    pub fn capture_block(mut self, frames: u32) -> Self {
        self.stream.capture_block = Some(frames);
        self
    }

    /// Default: 4096
    pub fn analysis_block(mut self, samples: usize) -> Self {
        self.stream.analysis_block = samples;
        self
    }

    /// Default: 2.0
    pub fn ring_seconds(mut self, seconds: f64) -> Self {
        self.stream.ring_seconds = seconds;
        self
    }

    /// Default: true
    pub fn passthrough(mut self, enabled: bool) -> Self {
        self.stream.passthrough = enabled;
        self
    }

    /// Default: false
    pub fn accumulate(mut self, enabled: bool) -> Self {
        self.stream.accumulate = enabled;
        self
    }

    /// Default: 0.8
    pub fn export_ceiling(mut self, ceiling: f32) -> Self {
        self.stream.export_ceiling = ceiling;
        self
    }

    /// Default: 2 s
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.stream.shutdown_timeout = timeout;
        self
    }

    pub fn input_device(mut self, index: usize) -> Self {
        self.stream.input_device = Some(index);
        self
    }

    pub fn output_device(mut self, index: usize) -> Self {
        self.stream.output_device = Some(index);
        self
    }

    /// Replace the whole stream configuration.
    pub fn stream_config(mut self, config: StreamConfig) -> Self {
        self.stream = config;
        self
    }

    /// Default: C2 (65.41 Hz) to C7 (2093 Hz)
    pub fn pitch_range(mut self, min_freq: f32, max_freq: f32) -> Self {
        self.analysis.min_freq = min_freq;
        self.analysis.max_freq = max_freq;
        self
    }

    /// Default: 2048
    pub fn frame_size(mut self, samples: usize) -> Self {
        self.analysis.frame_size = samples;
        self
    }

    /// Default: 512
    pub fn hop_size(mut self, samples: usize) -> Self {
        self.analysis.hop_size = samples;
        self
    }

    /// Initial autotune state. Default: off
    pub fn autotune(mut self, enabled: bool) -> Self {
        self.effects.autotune = enabled;
        self
    }

    /// Initial layering state. Default: off
    pub fn layering(mut self, enabled: bool) -> Self {
        self.effects.layering = enabled;
        self
    }

    /// Clamped into [0, 1]. Default: 1.0
    pub fn strength(mut self, strength: f32) -> Self {
        self.effects.strength = EffectSettings::clamp_strength(strength);
        self
    }

    /// Default: 2
    pub fn layers(mut self, layers: usize) -> Self {
        self.effects.layers = layers;
        self
    }

    /// Share an existing settings cell instead of creating one. Initial
    /// effect values set on this builder are ignored.
    pub fn shared_settings(mut self, settings: Arc<SharedSettings>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Audio backend. Default: CPAL on the default host.
    pub fn backend(mut self, backend: impl AudioBackend + 'static) -> Self {
        self.backend = Some(Box::new(backend));
        self
    }

    pub fn build(self) -> Result<CantusEngine> {
        self.stream.validate()?;
        self.analysis.validate(self.stream.sample_rate)?;
        if self.stream.analysis_block < self.analysis.frame_size {
            return Err(CoreError::InvalidConfig(format!(
                "analysis_block {} is shorter than one pitch frame ({})",
                self.stream.analysis_block, self.analysis.frame_size
            ))
            .into());
        }

        let settings = self
            .settings
            .unwrap_or_else(|| Arc::new(SharedSettings::new(self.effects)));
        let chain = EffectChain::new(self.stream.sample_rate, self.analysis, settings.clone())?;
        let chain_stats = chain.stats().clone();

        let backend = match self.backend {
            Some(backend) => backend,
            None => default_backend()?,
        };
        let stream = StreamEngine::new(self.stream, backend, Box::new(chain))?;

        Ok(CantusEngine::from_parts(
            stream,
            ControlSurface::new(settings),
            chain_stats,
            self.analysis,
        ))
    }
}

#[cfg(feature = "device")]
fn default_backend() -> Result<Box<dyn AudioBackend>> {
    Ok(Box::new(cantus_core::CpalBackend::new()))
}

#[cfg(not(feature = "device"))]
fn default_backend() -> Result<Box<dyn AudioBackend>> {
    Err(CoreError::InvalidConfig(
        "no audio backend: enable the `device` feature or call `backend()`".into(),
    )
    .into())
}
