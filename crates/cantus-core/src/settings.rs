//! Effect settings shared between the control surface and the worker.

use arc_swap::ArcSwap;
use std::sync::Arc;

/// One consistent set of effect parameters.
///
/// The processing worker reads a whole snapshot once per block, so a change
/// lands at the next block boundary and multi-field updates never tear.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct EffectSettings {
    pub autotune: bool,
    pub layering: bool,
    /// Crossfade between dry (0.0) and fully corrected (1.0) audio.
    pub strength: f32,
    /// Number of extra voices added by layering.
    pub layers: usize,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            autotune: false,
            layering: false,
            strength: 1.0,
            layers: 2,
        }
    }
}

impl EffectSettings {
    /// Clamp a requested strength into [0, 1]. NaN maps to 0.
    pub fn clamp_strength(strength: f32) -> f32 {
        if strength.is_nan() {
            0.0
        } else {
            strength.clamp(0.0, 1.0)
        }
    }
}

/// Process-wide settings cell. Outlives stream sessions.
///
/// Reads are lock-free (`ArcSwap::load`); writes replace the whole snapshot
/// with read-copy-update so concurrent setters never lose each other's fields.
pub struct SharedSettings {
    current: ArcSwap<EffectSettings>,
}

impl SharedSettings {
    pub fn new(initial: EffectSettings) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    /// Copy of the current settings.
    #[inline]
    pub fn snapshot(&self) -> EffectSettings {
        **self.current.load()
    }

    /// Apply `f` to a copy of the current settings and publish the result.
    ///
    /// Returns `(previous, current)`.
    pub fn update<F>(&self, f: F) -> (EffectSettings, EffectSettings)
    where
        F: Fn(&mut EffectSettings),
    {
        let previous = self.current.rcu(|current| {
            let mut next = **current;
            f(&mut next);
            next.strength = EffectSettings::clamp_strength(next.strength);
            Arc::new(next)
        });
        (*previous, self.snapshot())
    }
}

impl Default for SharedSettings {
    fn default() -> Self {
        Self::new(EffectSettings::default())
    }
}
