//! Autotune and layering, driven by shared settings.

use crate::{Error, PsolaResynthesizer, Resynthesizer, Result, VoiceLayeringEffect};
use cantus_analysis::{quantize, AnalysisConfig, PitchEstimator};
use cantus_core::{AudioBlock, BlockProcessor, SharedSettings};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Per-chain counters.
#[derive(Debug, Default)]
pub struct ChainStats {
    /// Blocks replaced by a pitch-corrected rendering.
    pub corrected: AtomicU64,
    /// Autotuned blocks with no voiced frame, passed through.
    pub unvoiced: AtomicU64,
    /// Autotuned blocks that fell back to the dry signal after a fault.
    pub fallbacks: AtomicU64,
    pub layered: AtomicU64,
}

impl ChainStats {
    pub fn snapshot(&self) -> ChainStatsSnapshot {
        ChainStatsSnapshot {
            corrected: self.corrected.load(Ordering::Relaxed),
            unvoiced: self.unvoiced.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            layered: self.layered.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainStatsSnapshot {
    pub corrected: u64,
    pub unvoiced: u64,
    pub fallbacks: u64,
    pub layered: u64,
}

/// Estimator → quantizer → resynthesizer, then layering.
///
/// Settings are read once per [`process`](Self::process) call, so a change
/// made while a block is in flight applies from the next block on.
pub struct EffectChain {
    analysis: AnalysisConfig,
    settings: Arc<SharedSettings>,
    estimator: PitchEstimator,
    resynthesizer: Box<dyn Resynthesizer>,
    layering: VoiceLayeringEffect,
    stats: Arc<ChainStats>,
}

impl EffectChain {
    pub fn new(
        sample_rate: f64,
        analysis: AnalysisConfig,
        settings: Arc<SharedSettings>,
    ) -> Result<Self> {
        Ok(Self {
            analysis,
            settings,
            estimator: PitchEstimator::new(sample_rate, analysis)?,
            resynthesizer: Box::new(PsolaResynthesizer::new()),
            layering: VoiceLayeringEffect::new(sample_rate),
            stats: Arc::new(ChainStats::default()),
        })
    }

    /// Replace the default PSOLA resynthesizer.
    pub fn with_resynthesizer(mut self, resynthesizer: Box<dyn Resynthesizer>) -> Self {
        self.resynthesizer = resynthesizer;
        self
    }

    pub fn settings(&self) -> &Arc<SharedSettings> {
        &self.settings
    }

    pub fn stats(&self) -> &Arc<ChainStats> {
        &self.stats
    }

    pub fn analysis(&self) -> &AnalysisConfig {
        &self.analysis
    }

    /// Run one block through the enabled effects.
    ///
    /// Never fails: a correction fault falls back to the unmodified block
    /// for this call only.
    pub fn process(&mut self, block: AudioBlock) -> AudioBlock {
        let settings = self.settings.snapshot();
        let mut output = block;

        if settings.autotune {
            let result = catch_unwind(AssertUnwindSafe(|| self.correct(&output)));
            let corrected = match result {
                Ok(Ok(Some(corrected))) => {
                    self.stats.corrected.fetch_add(1, Ordering::Relaxed);
                    Some(corrected)
                }
                Ok(Ok(None)) => {
                    self.stats.unvoiced.fetch_add(1, Ordering::Relaxed);
                    None
                }
                Ok(Err(err)) => {
                    self.stats.fallbacks.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("Pitch correction failed, passing block through: {}", err);
                    None
                }
                Err(_) => {
                    self.stats.fallbacks.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("Pitch correction panicked, passing block through");
                    None
                }
            };

            if let Some(corrected) = corrected {
                output = output.crossfade(&corrected, settings.strength);
            }
        }

        if settings.layering && settings.layers > 0 {
            output = self.layering.apply_layers(&output, settings.layers);
            self.stats.layered.fetch_add(1, Ordering::Relaxed);
        }

        output
    }

    /// Fully corrected block, or `None` when nothing in it is voiced.
    fn correct(&mut self, block: &AudioBlock) -> Result<Option<AudioBlock>> {
        let source = self.estimator.estimate(block);
        let target = quantize(&source);
        if target.is_all_unvoiced() {
            return Ok(None);
        }

        let corrected = self.resynthesizer.resynthesize_with_source(
            block,
            &source,
            &target,
            self.analysis.min_freq,
            self.analysis.max_freq,
        )?;

        if corrected.len() != block.len() {
            return Err(Error::LengthMismatch {
                expected: block.len(),
                actual: corrected.len(),
            });
        }
        if !corrected.is_finite() {
            return Err(Error::Degenerate("non-finite resynthesis output".into()));
        }
        Ok(Some(corrected))
    }
}

impl BlockProcessor for EffectChain {
    fn process(&mut self, block: AudioBlock) -> AudioBlock {
        EffectChain::process(self, block)
    }
}
