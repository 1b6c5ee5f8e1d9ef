//! Top-level engine: one stream session plus the controls that outlive it.

use crate::{CantusEngineBuilder, ControlSurface, Result};
use cantus_analysis::AnalysisConfig;
use cantus_core::{EffectSettings, EngineState, Sample, StatsSnapshot, StreamConfig, StreamEngine};
use cantus_dsp::{ChainStats, ChainStatsSnapshot};
use std::sync::Arc;

/// Live vocal processing engine.
///
/// The effect settings (and so any [`ControlSurface`] handed out) persist
/// across `start`/`stop` cycles, as does the accumulated mix until
/// [`clear_mix`](Self::clear_mix).
pub struct CantusEngine {
    stream: StreamEngine,
    control: ControlSurface,
    chain_stats: Arc<ChainStats>,
    analysis: AnalysisConfig,
}

impl CantusEngine {
    pub fn builder() -> CantusEngineBuilder {
        CantusEngineBuilder::default()
    }

    pub(crate) fn from_parts(
        stream: StreamEngine,
        control: ControlSurface,
        chain_stats: Arc<ChainStats>,
        analysis: AnalysisConfig,
    ) -> Self {
        Self {
            stream,
            control,
            chain_stats,
            analysis,
        }
    }

    /// Open the device and start processing. No-op while already running.
    pub fn start(&self) -> Result<()> {
        Ok(self.stream.start()?)
    }

    /// Stop processing and close the device. No-op while stopped.
    pub fn stop(&self) -> Result<()> {
        Ok(self.stream.stop()?)
    }

    pub fn state(&self) -> EngineState {
        self.stream.state()
    }

    pub fn is_running(&self) -> bool {
        self.stream.is_running()
    }

    /// Handle for toggling effects from any thread.
    pub fn control(&self) -> ControlSurface {
        self.control.clone()
    }

    pub fn settings(&self) -> EffectSettings {
        self.control.settings()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stream.stats().snapshot()
    }

    pub fn chain_stats(&self) -> ChainStatsSnapshot {
        self.chain_stats.snapshot()
    }

    /// Processed audio accumulated so far, peak-normalized to the configured
    /// export ceiling. Persisting it is up to the caller.
    pub fn export_mix(&self) -> Vec<Sample> {
        self.stream.sink().export(self.stream.config().export_ceiling)
    }

    /// Start or stop keeping processed blocks for export. Takes effect from
    /// the next block; the mix collected so far is kept.
    pub fn set_accumulate(&self, enabled: bool) {
        self.stream.sink().set_enabled(enabled);
    }

    pub fn is_accumulating(&self) -> bool {
        self.stream.sink().is_enabled()
    }

    pub fn clear_mix(&self) {
        self.stream.sink().clear();
    }

    /// Samples accumulated so far.
    pub fn mix_len(&self) -> usize {
        self.stream.sink().len()
    }

    pub fn sample_rate(&self) -> f64 {
        self.stream.config().sample_rate
    }

    pub fn config(&self) -> &StreamConfig {
        self.stream.config()
    }

    pub fn analysis_config(&self) -> &AnalysisConfig {
        &self.analysis
    }

    #[cfg(feature = "device")]
    pub fn list_input_devices() -> Result<Vec<cantus_core::DeviceInfo>> {
        Ok(cantus_core::CpalBackend::list_input_devices()?)
    }

    #[cfg(feature = "device")]
    pub fn list_output_devices() -> Result<Vec<cantus_core::DeviceInfo>> {
        Ok(cantus_core::CpalBackend::list_output_devices()?)
    }
}
