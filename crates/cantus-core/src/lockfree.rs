//! Lock-free primitives shared with the hardware callback.

use atomic_float::AtomicF32;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cache-line aligned atomic f32.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicFloat {
    value: AtomicF32,
}

impl AtomicFloat {
    pub fn new(value: f32) -> Self {
        Self {
            value: AtomicF32::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> f32 {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: f32) {
        self.value.store(value, Ordering::Release);
    }

    /// Peak-hold update: keeps `value` if it is larger, otherwise decays the
    /// held value by `decay`.
    #[inline]
    pub fn hold_peak(&self, value: f32, decay: f32) {
        let held = self.value.load(Ordering::Relaxed);
        let next = if value > held { value } else { held * decay };
        self.value.store(next, Ordering::Release);
    }
}

impl Default for AtomicFloat {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Cache-line aligned atomic bool.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicFlag {
    value: AtomicBool,
}

impl AtomicFlag {
    pub fn new(value: bool) -> Self {
        Self {
            value: AtomicBool::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> bool {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: bool) {
        self.value.store(value, Ordering::Release);
    }

    #[inline]
    pub fn swap(&self, value: bool) -> bool {
        self.value.swap(value, Ordering::AcqRel)
    }
}

impl Default for AtomicFlag {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hold_peak_decays() {
        let peak = AtomicFloat::new(0.0);
        peak.hold_peak(0.8, 0.5);
        assert_eq!(peak.get(), 0.8);
        peak.hold_peak(0.1, 0.5);
        assert_eq!(peak.get(), 0.4);
        peak.hold_peak(0.9, 0.5);
        assert_eq!(peak.get(), 0.9);
    }

    #[test]
    fn test_atomic_flag() {
        let flag = AtomicFlag::new(false);
        assert!(!flag.get());
        assert!(!flag.swap(true));
        assert!(flag.get());
    }
}
